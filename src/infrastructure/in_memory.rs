use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::payment::{PaymentId, PaymentStatus, PendingPayment};
use crate::domain::pin::PaymentPin;
use crate::domain::ports::{
    BankDirectory, PaymentStore, PinStore, TransactionRecordStore, WalletStore,
};
use crate::domain::transaction::{CanonicalStatus, TransactionRecord};
use crate::domain::wallet::{Amount, Balance, DebitOutcome, Wallet, WalletId};
use crate::error::{PaymentError, Result};

/// In-memory wallet ledger.
///
/// `try_debit` and `credit` run the whole read-modify-write under one write
/// lock, which is what makes the check-and-debit atomic across concurrent
/// payment attempts.
#[derive(Default, Clone)]
pub struct InMemoryWalletStore {
    wallets: Arc<RwLock<HashMap<WalletId, Wallet>>>,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn insert(&self, wallet: Wallet) -> Result<()> {
        let mut wallets = self.wallets.write().await;
        wallets.insert(wallet.id.clone(), wallet);
        Ok(())
    }

    async fn get(&self, id: &WalletId) -> Result<Option<Wallet>> {
        let wallets = self.wallets.read().await;
        Ok(wallets.get(id).cloned())
    }

    async fn try_debit(&self, id: &WalletId, amount: Amount) -> Result<DebitOutcome> {
        let mut wallets = self.wallets.write().await;
        let wallet = wallets
            .get_mut(id)
            .ok_or_else(|| PaymentError::Validation(format!("wallet {id} not found")))?;
        Ok(wallet.try_debit(amount))
    }

    async fn credit(&self, id: &WalletId, amount: Amount) -> Result<Balance> {
        let mut wallets = self.wallets.write().await;
        let wallet = wallets.get_mut(id).ok_or_else(|| {
            PaymentError::Integrity(format!("credit to unknown wallet {id} would lose funds"))
        })?;
        Ok(wallet.credit(amount))
    }
}

/// In-memory PIN records. Backed by a `Vec` rather than a map keyed by
/// wallet: the store itself does not enforce the one-record-per-wallet
/// invariant, the verifier does, and refuses to proceed when it is broken.
#[derive(Default, Clone)]
pub struct InMemoryPinStore {
    pins: Arc<RwLock<Vec<PaymentPin>>>,
}

impl InMemoryPinStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PinStore for InMemoryPinStore {
    async fn insert(&self, pin: PaymentPin) -> Result<()> {
        let mut pins = self.pins.write().await;
        pins.push(pin);
        Ok(())
    }

    async fn find_by_wallet(&self, wallet: &WalletId) -> Result<Vec<PaymentPin>> {
        let pins = self.pins.read().await;
        Ok(pins.iter().filter(|p| &p.wallet == wallet).cloned().collect())
    }

    async fn replace(&self, pin: PaymentPin) -> Result<()> {
        let mut pins = self.pins.write().await;
        pins.retain(|p| p.wallet != pin.wallet);
        pins.push(pin);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<PaymentId, PendingPayment>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn upsert(&self, payment: PendingPayment) -> Result<()> {
        let mut payments = self.payments.write().await;
        payments.insert(payment.id.clone(), payment);
        Ok(())
    }

    async fn insert_or_get(&self, payment: PendingPayment) -> Result<PendingPayment> {
        let mut payments = self.payments.write().await;
        let stored = payments.entry(payment.id.clone()).or_insert(payment);
        Ok(stored.clone())
    }

    async fn get(&self, id: &PaymentId) -> Result<Option<PendingPayment>> {
        let payments = self.payments.read().await;
        Ok(payments.get(id).cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<PendingPayment>> {
        let payments = self.payments.read().await;
        Ok(payments
            .values()
            .find(|p| {
                p.transaction_reference.as_deref() == Some(reference) || p.id.as_str() == reference
            })
            .cloned())
    }

    async fn advance_if(
        &self,
        id: &PaymentId,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<Option<PendingPayment>> {
        let mut payments = self.payments.write().await;
        let Some(payment) = payments.get_mut(id) else {
            return Ok(None);
        };
        if payment.status != expected {
            return Ok(None);
        }
        payment.advance(next)?;
        Ok(Some(payment.clone()))
    }
}

#[derive(Default, Clone)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<HashMap<String, TransactionRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionRecordStore for InMemoryRecordStore {
    async fn insert(&self, record: TransactionRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.entry(record.reference.clone()).or_insert(record);
        Ok(())
    }

    async fn get(&self, reference: &str) -> Result<Option<TransactionRecord>> {
        let records = self.records.read().await;
        Ok(records.get(reference).cloned())
    }

    async fn set_status(
        &self,
        reference: &str,
        status: CanonicalStatus,
    ) -> Result<Option<TransactionRecord>> {
        let mut records = self.records.write().await;
        match records.get_mut(reference) {
            Some(record) => {
                record.status = status;
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }
}

/// Bank name → code map, name-matched case-insensitively.
#[derive(Default, Clone)]
pub struct InMemoryBankDirectory {
    banks: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryBankDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BankDirectory for InMemoryBankDirectory {
    async fn code_for(&self, bank_name: &str) -> Result<Option<String>> {
        let banks = self.banks.read().await;
        Ok(banks.get(&bank_name.trim().to_lowercase()).cloned())
    }

    async fn insert(&self, bank_name: String, bank_code: String) -> Result<()> {
        let mut banks = self.banks.write().await;
        banks.insert(bank_name.trim().to_lowercase(), bank_code);
        Ok(())
    }

    async fn contains_code(&self, bank_code: &str) -> Result<bool> {
        let banks = self.banks.read().await;
        Ok(banks.values().any(|code| code == bank_code))
    }
}
