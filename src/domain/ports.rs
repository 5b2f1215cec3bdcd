use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::payment::{PaymentId, PaymentStatus, PendingPayment};
use super::pin::PaymentPin;
use super::transaction::{CanonicalStatus, TransactionRecord};
use super::wallet::{Amount, Balance, DebitOutcome, Wallet, WalletId};
use crate::error::Result;

pub type WalletStoreRef = Arc<dyn WalletStore>;
pub type PinStoreRef = Arc<dyn PinStore>;
pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type RecordStoreRef = Arc<dyn TransactionRecordStore>;
pub type BankDirectoryRef = Arc<dyn BankDirectory>;
pub type TransferGatewayRef = Arc<dyn TransferGateway>;

/// The wallet ledger. Balance mutations happen only here, and only through
/// the atomic operations below.
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn insert(&self, wallet: Wallet) -> Result<()>;

    async fn get(&self, id: &WalletId) -> Result<Option<Wallet>>;

    /// Atomic check-and-debit. Two concurrent calls against the same wallet
    /// must never both pass the sufficiency check on a stale balance. An
    /// unknown wallet is a validation error.
    async fn try_debit(&self, id: &WalletId, amount: Amount) -> Result<DebitOutcome>;

    /// Credits the wallet (compensating refund, inbound settlement). Credit
    /// of an unknown wallet is an integrity error: money must never vanish
    /// silently.
    async fn credit(&self, id: &WalletId, amount: Amount) -> Result<Balance>;
}

#[async_trait]
pub trait PinStore: Send + Sync {
    async fn insert(&self, pin: PaymentPin) -> Result<()>;

    /// Every PIN record bound to the wallet. More than one is an integrity
    /// violation the verifier refuses to resolve silently.
    async fn find_by_wallet(&self, wallet: &WalletId) -> Result<Vec<PaymentPin>>;

    /// Replaces any existing record for the pin's wallet.
    async fn replace(&self, pin: PaymentPin) -> Result<()>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn upsert(&self, payment: PendingPayment) -> Result<()>;

    /// Inserts the payment if its id is unseen, atomically, and returns the
    /// stored copy either way. The dispatcher's entry point: a concurrent
    /// dispatch of the same payment must never reset stored state.
    async fn insert_or_get(&self, payment: PendingPayment) -> Result<PendingPayment>;

    async fn get(&self, id: &PaymentId) -> Result<Option<PendingPayment>>;

    /// Looks a payment up by its gateway reference, falling back to the
    /// payment id (the client reference sent with the submission) so that
    /// timed-out attempts without a gateway reference stay reachable.
    async fn find_by_reference(&self, reference: &str) -> Result<Option<PendingPayment>>;

    /// Atomically advances the stored payment to `next` iff its current
    /// status equals `expected`, returning the updated payment. `None` means
    /// another flow claimed the transition first; the debit gate relies on
    /// this to guarantee at most one debit per payment.
    async fn advance_if(
        &self,
        id: &PaymentId,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<Option<PendingPayment>>;
}

#[async_trait]
pub trait TransactionRecordStore: Send + Sync {
    /// Inserts the record, keeping an existing record for the same reference
    /// untouched (idempotent insert).
    async fn insert(&self, record: TransactionRecord) -> Result<()>;

    async fn get(&self, reference: &str) -> Result<Option<TransactionRecord>>;

    /// Progresses the canonical status of an existing record. Returns the
    /// updated record, or `None` when no record carries the reference.
    async fn set_status(
        &self,
        reference: &str,
        status: CanonicalStatus,
    ) -> Result<Option<TransactionRecord>>;
}

/// Read-mostly bank name → bank code directory.
#[async_trait]
pub trait BankDirectory: Send + Sync {
    async fn code_for(&self, bank_name: &str) -> Result<Option<String>>;

    async fn insert(&self, bank_name: String, bank_code: String) -> Result<()>;

    async fn contains_code(&self, bank_code: &str) -> Result<bool>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub destination_bank_code: String,
    pub destination_account_number: String,
    pub amount: Decimal,
    pub source_account_number: String,
    pub narration: String,
    /// Idempotency key; doubles as the status-query handle for submissions
    /// whose gateway reference was lost to a timeout.
    pub client_reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAcceptance {
    pub transaction_reference: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    pub status: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub destination_account_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAccount {
    pub account_name: String,
    #[serde(default)]
    pub bank_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletRequest {
    pub ex_ref: String,
    pub name: String,
    pub identity_number: String,
    pub description: String,
    pub account_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedAccount {
    pub id: String,
    pub account_number: String,
    #[serde(default)]
    pub bank_code: Option<String>,
    #[serde(default)]
    pub bank_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankEntry {
    pub bank_name: String,
    pub bank_code: String,
}

/// The external banking gateway. Production talks HTTP; tests script it.
#[async_trait]
pub trait TransferGateway: Send + Sync {
    async fn resolve_account(
        &self,
        bank_code: &str,
        account_number: &str,
    ) -> Result<ResolvedAccount>;

    /// Submits a transfer. Never retried by the engine: only the caller may
    /// retry, with a fresh payment attempt.
    async fn submit_transfer(&self, request: TransferRequest) -> Result<TransferAcceptance>;

    async fn query_status(&self, reference: &str) -> Result<GatewayStatus>;

    async fn create_wallet(&self, request: CreateWalletRequest) -> Result<ProvisionedAccount>;

    async fn list_banks(&self) -> Result<Vec<BankEntry>>;
}
