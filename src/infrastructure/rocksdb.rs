use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::payment::{PaymentId, PaymentStatus, PendingPayment};
use crate::domain::pin::PaymentPin;
use crate::domain::ports::{
    BankDirectory, PaymentStore, PinStore, TransactionRecordStore, WalletStore,
};
use crate::domain::transaction::{CanonicalStatus, TransactionRecord};
use crate::domain::wallet::{Amount, Balance, DebitOutcome, Wallet, WalletId};
use crate::error::{PaymentError, Result};

pub const CF_WALLETS: &str = "wallets";
pub const CF_PINS: &str = "pins";
pub const CF_PAYMENTS: &str = "payments";
pub const CF_RECORDS: &str = "records";
pub const CF_BANKS: &str = "banks";

/// Persistent store backing every port on one RocksDB instance, one column
/// family per entity.
///
/// Read-modify-write sequences (debit, credit, status CAS, PIN replace) are
/// serialized through a single mutex; that lock is the atomicity guarantee
/// the ledger and the payment-state gates rely on. `Clone` shares the
/// underlying handle.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    rmw_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates the database, ensuring every column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_WALLETS, CF_PINS, CF_PAYMENTS, CF_RECORDS, CF_BANKS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;
        Ok(Self {
            db: Arc::new(db),
            rmw_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PaymentError::Store(format!("column family {name} not found")))
    }

    fn put<T: serde::Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        let handle = self.cf(cf)?;
        let bytes = serde_json::to_vec(value)
            .map_err(|e| PaymentError::Store(format!("serialization error: {e}")))?;
        self.db.put_cf(handle, key, bytes)?;
        Ok(())
    }

    fn fetch<T: serde::de::DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        let handle = self.cf(cf)?;
        match self.db.get_cf(handle, key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| PaymentError::Store(format!("deserialization error: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl WalletStore for RocksDbStore {
    async fn insert(&self, wallet: Wallet) -> Result<()> {
        let _guard = self.rmw_lock.lock().await;
        self.put(CF_WALLETS, wallet.id.as_str().as_bytes(), &wallet)
    }

    async fn get(&self, id: &WalletId) -> Result<Option<Wallet>> {
        self.fetch(CF_WALLETS, id.as_str().as_bytes())
    }

    async fn try_debit(&self, id: &WalletId, amount: Amount) -> Result<DebitOutcome> {
        let _guard = self.rmw_lock.lock().await;
        let mut wallet: Wallet = self
            .fetch(CF_WALLETS, id.as_str().as_bytes())?
            .ok_or_else(|| PaymentError::Validation(format!("wallet {id} not found")))?;
        let outcome = wallet.try_debit(amount);
        if matches!(outcome, DebitOutcome::Debited { .. }) {
            self.put(CF_WALLETS, id.as_str().as_bytes(), &wallet)?;
        }
        Ok(outcome)
    }

    async fn credit(&self, id: &WalletId, amount: Amount) -> Result<Balance> {
        let _guard = self.rmw_lock.lock().await;
        let mut wallet: Wallet = self.fetch(CF_WALLETS, id.as_str().as_bytes())?.ok_or_else(|| {
            PaymentError::Integrity(format!("credit to unknown wallet {id} would lose funds"))
        })?;
        let balance = wallet.credit(amount);
        self.put(CF_WALLETS, id.as_str().as_bytes(), &wallet)?;
        Ok(balance)
    }
}

#[async_trait]
impl PinStore for RocksDbStore {
    async fn insert(&self, pin: PaymentPin) -> Result<()> {
        let _guard = self.rmw_lock.lock().await;
        let key = pin.wallet.as_str().as_bytes().to_vec();
        let mut pins: Vec<PaymentPin> = self.fetch(CF_PINS, &key)?.unwrap_or_default();
        pins.push(pin);
        self.put(CF_PINS, &key, &pins)
    }

    async fn find_by_wallet(&self, wallet: &WalletId) -> Result<Vec<PaymentPin>> {
        Ok(self
            .fetch(CF_PINS, wallet.as_str().as_bytes())?
            .unwrap_or_default())
    }

    async fn replace(&self, pin: PaymentPin) -> Result<()> {
        let _guard = self.rmw_lock.lock().await;
        let key = pin.wallet.as_str().as_bytes().to_vec();
        self.put(CF_PINS, &key, &vec![pin])
    }
}

#[async_trait]
impl PaymentStore for RocksDbStore {
    async fn upsert(&self, payment: PendingPayment) -> Result<()> {
        let _guard = self.rmw_lock.lock().await;
        self.put(CF_PAYMENTS, payment.id.as_str().as_bytes(), &payment)
    }

    async fn insert_or_get(&self, payment: PendingPayment) -> Result<PendingPayment> {
        let _guard = self.rmw_lock.lock().await;
        if let Some(existing) =
            self.fetch::<PendingPayment>(CF_PAYMENTS, payment.id.as_str().as_bytes())?
        {
            return Ok(existing);
        }
        self.put(CF_PAYMENTS, payment.id.as_str().as_bytes(), &payment)?;
        Ok(payment)
    }

    async fn get(&self, id: &PaymentId) -> Result<Option<PendingPayment>> {
        self.fetch(CF_PAYMENTS, id.as_str().as_bytes())
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<PendingPayment>> {
        let handle = self.cf(CF_PAYMENTS)?;
        for item in self.db.iterator_cf(handle, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            let payment: PendingPayment = serde_json::from_slice(&value)
                .map_err(|e| PaymentError::Store(format!("deserialization error: {e}")))?;
            if payment.transaction_reference.as_deref() == Some(reference)
                || payment.id.as_str() == reference
            {
                return Ok(Some(payment));
            }
        }
        Ok(None)
    }

    async fn advance_if(
        &self,
        id: &PaymentId,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<Option<PendingPayment>> {
        let _guard = self.rmw_lock.lock().await;
        let Some(mut payment) = self.fetch::<PendingPayment>(CF_PAYMENTS, id.as_str().as_bytes())?
        else {
            return Ok(None);
        };
        if payment.status != expected {
            return Ok(None);
        }
        payment.advance(next)?;
        self.put(CF_PAYMENTS, id.as_str().as_bytes(), &payment)?;
        Ok(Some(payment))
    }
}

#[async_trait]
impl TransactionRecordStore for RocksDbStore {
    async fn insert(&self, record: TransactionRecord) -> Result<()> {
        let _guard = self.rmw_lock.lock().await;
        let key = record.reference.as_bytes().to_vec();
        if self.fetch::<TransactionRecord>(CF_RECORDS, &key)?.is_some() {
            return Ok(());
        }
        self.put(CF_RECORDS, &key, &record)
    }

    async fn get(&self, reference: &str) -> Result<Option<TransactionRecord>> {
        self.fetch(CF_RECORDS, reference.as_bytes())
    }

    async fn set_status(
        &self,
        reference: &str,
        status: CanonicalStatus,
    ) -> Result<Option<TransactionRecord>> {
        let _guard = self.rmw_lock.lock().await;
        let Some(mut record) = self.fetch::<TransactionRecord>(CF_RECORDS, reference.as_bytes())?
        else {
            return Ok(None);
        };
        record.status = status;
        self.put(CF_RECORDS, reference.as_bytes(), &record)?;
        Ok(Some(record))
    }
}

#[async_trait]
impl BankDirectory for RocksDbStore {
    async fn code_for(&self, bank_name: &str) -> Result<Option<String>> {
        self.fetch(CF_BANKS, bank_name.trim().to_lowercase().as_bytes())
    }

    async fn insert(&self, bank_name: String, bank_code: String) -> Result<()> {
        let _guard = self.rmw_lock.lock().await;
        self.put(CF_BANKS, bank_name.trim().to_lowercase().as_bytes(), &bank_code)
    }

    async fn contains_code(&self, bank_code: &str) -> Result<bool> {
        let handle = self.cf(CF_BANKS)?;
        for item in self.db.iterator_cf(handle, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            let code: String = serde_json::from_slice(&value)
                .map_err(|e| PaymentError::Store(format!("deserialization error: {e}")))?;
            if code == bank_code {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
