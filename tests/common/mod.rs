#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use walletpay::application::dispatcher::PaymentDispatcher;
use walletpay::application::reconciler::StatusReconciler;
use walletpay::application::resolver::BankAccountResolver;
use walletpay::application::verifier::PinVerifier;
use walletpay::domain::payment::{Destination, PaymentId, PendingPayment};
use walletpay::domain::ports::{
    BankEntry, CreateWalletRequest, GatewayStatus, PaymentStore, ProvisionedAccount,
    ResolvedAccount, TransactionRecordStore, TransferAcceptance, TransferGateway, TransferRequest,
    WalletStore,
};
use walletpay::domain::wallet::{Amount, Balance, IdentityRef, Wallet, WalletId};
use walletpay::error::{GatewayError, Result};
use walletpay::infrastructure::in_memory::{
    InMemoryBankDirectory, InMemoryPaymentStore, InMemoryPinStore, InMemoryRecordStore,
    InMemoryWalletStore,
};

pub enum SubmitOutcome {
    Accept {
        reference: String,
        status: Option<String>,
    },
    Reject {
        code: u16,
        message: String,
    },
    Timeout,
    Unavailable,
}

pub enum StatusOutcome {
    Status(String),
    NotFound,
    Unreachable,
}

/// Scripted gateway double. Each call pops the next scripted outcome; an
/// unscripted call panics, so tests also assert which calls never happen.
#[derive(Default)]
pub struct MockGateway {
    submit_script: Mutex<VecDeque<SubmitOutcome>>,
    status_script: Mutex<VecDeque<StatusOutcome>>,
    pub submit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub resolve_calls: AtomicUsize,
}

impl MockGateway {
    pub fn script_submit(&self, outcome: SubmitOutcome) {
        self.submit_script.lock().unwrap().push_back(outcome);
    }

    pub fn script_status(&self, outcome: StatusOutcome) {
        self.status_script.lock().unwrap().push_back(outcome);
    }
}

#[async_trait]
impl TransferGateway for MockGateway {
    async fn resolve_account(
        &self,
        _bank_code: &str,
        _account_number: &str,
    ) -> Result<ResolvedAccount> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ResolvedAccount {
            account_name: "ADA OKAFOR".into(),
            bank_name: Some("First Bank".into()),
        })
    }

    async fn submit_transfer(&self, _request: TransferRequest) -> Result<TransferAcceptance> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .submit_script
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted submit_transfer call");
        match outcome {
            SubmitOutcome::Accept { reference, status } => Ok(TransferAcceptance {
                transaction_reference: reference,
                status,
            }),
            SubmitOutcome::Reject { code, message } => Err(GatewayError::Api {
                endpoint: "/virtual/transfers".into(),
                status: code,
                body: message,
            }
            .into()),
            SubmitOutcome::Timeout => Err(GatewayError::Timeout {
                endpoint: "/virtual/transfers".into(),
                elapsed_ms: 30_000,
            }
            .into()),
            SubmitOutcome::Unavailable => Err(GatewayError::Api {
                endpoint: "/virtual/transfers".into(),
                status: 502,
                body: "bad gateway".into(),
            }
            .into()),
        }
    }

    async fn query_status(&self, _reference: &str) -> Result<GatewayStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .status_script
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted query_status call");
        match outcome {
            StatusOutcome::Status(status) => Ok(GatewayStatus {
                status,
                amount: None,
                destination_account_name: None,
                message: None,
            }),
            StatusOutcome::NotFound => Err(GatewayError::NotFound {
                endpoint: "/virtual/transfers/status".into(),
            }
            .into()),
            StatusOutcome::Unreachable => Err(GatewayError::Network {
                endpoint: "/virtual/transfers/status".into(),
                reason: "connection refused".into(),
            }
            .into()),
        }
    }

    async fn create_wallet(&self, request: CreateWalletRequest) -> Result<ProvisionedAccount> {
        Ok(ProvisionedAccount {
            id: format!("w-{}", request.ex_ref),
            account_number: "9000136910".into(),
            bank_code: Some("100001".into()),
            bank_name: Some("Gateway Bank".into()),
        })
    }

    async fn list_banks(&self) -> Result<Vec<BankEntry>> {
        Ok(vec![
            BankEntry {
                bank_name: "First Bank".into(),
                bank_code: "100004".into(),
            },
            BankEntry {
                bank_name: "Zenith Bank".into(),
                bank_code: "100010".into(),
            },
        ])
    }
}

/// In-memory engine with a scripted gateway behind it.
pub struct Harness {
    pub wallets: Arc<InMemoryWalletStore>,
    pub pins: Arc<InMemoryPinStore>,
    pub payments: Arc<InMemoryPaymentStore>,
    pub records: Arc<InMemoryRecordStore>,
    pub banks: Arc<InMemoryBankDirectory>,
    pub gateway: Arc<MockGateway>,
    pub verifier: PinVerifier,
    pub dispatcher: PaymentDispatcher,
    pub reconciler: StatusReconciler,
}

impl Harness {
    pub fn new() -> Self {
        let wallets = Arc::new(InMemoryWalletStore::new());
        let pins = Arc::new(InMemoryPinStore::new());
        let payments = Arc::new(InMemoryPaymentStore::new());
        let records = Arc::new(InMemoryRecordStore::new());
        let banks = Arc::new(InMemoryBankDirectory::new());
        let gateway = Arc::new(MockGateway::default());

        let verifier = PinVerifier::new(pins.clone());
        let resolver = BankAccountResolver::new(gateway.clone(), banks.clone());
        let dispatcher = PaymentDispatcher::new(
            wallets.clone(),
            payments.clone(),
            records.clone(),
            gateway.clone(),
            verifier.clone(),
            resolver,
        );
        let reconciler = StatusReconciler::new(
            wallets.clone(),
            payments.clone(),
            records.clone(),
            gateway.clone(),
        );

        Self {
            wallets,
            pins,
            payments,
            records,
            banks,
            gateway,
            verifier,
            dispatcher,
            reconciler,
        }
    }

    pub async fn seed_wallet(&self, id: &str, balance: Decimal, pin: &str) -> WalletId {
        let wallet_id = self.seed_wallet_without_pin(id, balance).await;
        self.verifier.setup(wallet_id.clone(), pin).await.unwrap();
        wallet_id
    }

    pub async fn seed_wallet_without_pin(&self, id: &str, balance: Decimal) -> WalletId {
        let wallet_id = WalletId::new(id);
        let mut wallet = Wallet::provisioned(
            wallet_id.clone(),
            "Ada Okafor",
            IdentityRef::new("12345678901").unwrap(),
            "9000136910",
        );
        wallet.balance = Balance::new(balance);
        self.wallets.insert(wallet).await.unwrap();
        wallet_id
    }

    pub fn draft_payment(&self, id: &str, wallet: &WalletId, amount: Decimal) -> PendingPayment {
        PendingPayment::new(
            PaymentId::new(id),
            wallet.clone(),
            Destination {
                account_number: "8169246969".into(),
                bank_code: Some("100004".into()),
                bank_name: "First Bank".into(),
            },
            Amount::new(amount).unwrap(),
        )
    }

    pub async fn balance(&self, wallet: &WalletId) -> Decimal {
        self.wallets
            .get(wallet)
            .await
            .unwrap()
            .unwrap()
            .balance
            .into()
    }

    pub async fn payment(&self, id: &str) -> PendingPayment {
        self.payments
            .get(&PaymentId::new(id))
            .await
            .unwrap()
            .unwrap()
    }

    pub fn submit_calls(&self) -> usize {
        self.gateway.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.gateway.status_calls.load(Ordering::SeqCst)
    }
}
