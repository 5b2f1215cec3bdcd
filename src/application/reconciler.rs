use tracing::{info, warn};

use super::unix_ms;
use crate::domain::payment::{PaymentId, PaymentStatus, PendingPayment};
use crate::domain::ports::{
    PaymentStore, PaymentStoreRef, RecordStoreRef, TransactionRecordStore, TransferGateway,
    TransferGatewayRef, WalletStore, WalletStoreRef,
};
use crate::domain::transaction::{CanonicalStatus, TransactionRecord};
use crate::error::{GatewayError, PaymentError, Result};

/// Determines the authoritative status of a transfer, local record first,
/// live gateway second, and settles payments the dispatcher had to leave in
/// `Submitted`.
#[derive(Clone)]
pub struct StatusReconciler {
    wallets: WalletStoreRef,
    payments: PaymentStoreRef,
    records: RecordStoreRef,
    gateway: TransferGatewayRef,
}

impl StatusReconciler {
    pub fn new(
        wallets: WalletStoreRef,
        payments: PaymentStoreRef,
        records: RecordStoreRef,
        gateway: TransferGatewayRef,
    ) -> Self {
        Self {
            wallets,
            payments,
            records,
            gateway,
        }
    }

    /// Resolves the canonical status for a transaction reference.
    ///
    /// A local record with a terminal status answers without a gateway call.
    /// A non-terminal local status is re-checked against the gateway so the
    /// record can progress. "Could not check" surfaces as `Indeterminate`,
    /// never as `Failed`.
    pub async fn reconcile(&self, reference: &str) -> Result<CanonicalStatus> {
        if let Some(record) = self.records.get(reference).await?
            && record.status.is_terminal()
        {
            return Ok(record.status);
        }

        match self.gateway.query_status(reference).await {
            Ok(remote) => {
                let canonical = CanonicalStatus::from_vocabulary(&remote.status);
                if canonical != CanonicalStatus::Unknown {
                    self.records.set_status(reference, canonical).await?;
                }
                self.settle(reference, canonical).await?;
                Ok(canonical)
            }
            Err(PaymentError::Gateway(GatewayError::NotFound { .. })) => {
                Ok(CanonicalStatus::Unknown)
            }
            Err(PaymentError::Gateway(err)) if err.is_transient() => {
                warn!(reference, error = %err, "gateway status query failed; result indeterminate");
                Ok(CanonicalStatus::Indeterminate)
            }
            Err(err) => Err(err),
        }
    }

    /// Reconciles a payment attempt by id, using its gateway reference when
    /// one was captured and falling back to the client reference sent with
    /// the submission (the only handle a timed-out attempt has).
    pub async fn reconcile_payment(&self, id: &PaymentId) -> Result<CanonicalStatus> {
        let payment = self
            .payments
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::Validation(format!("unknown payment {id}")))?;

        match payment.status {
            PaymentStatus::Draft | PaymentStatus::PinPending | PaymentStatus::Authorized => {
                Ok(CanonicalStatus::Pending)
            }
            PaymentStatus::Failed | PaymentStatus::InsufficientFunds => Ok(CanonicalStatus::Failed),
            PaymentStatus::Succeeded | PaymentStatus::Submitted => {
                let reference = payment
                    .transaction_reference
                    .clone()
                    .unwrap_or_else(|| payment.id.as_str().to_owned());
                self.reconcile(&reference).await
            }
        }
    }

    /// Applies a gateway verdict to a payment still in `Submitted`.
    ///
    /// Success-class statuses prove the transfer reached the gateway: the
    /// reference and record are persisted (recovering the timeout window).
    /// A failed verdict triggers the compensating refund. The
    /// Submitted → terminal transition is claimed atomically first, so a
    /// concurrent reconcile or dispatch can never settle the same payment
    /// twice.
    async fn settle(&self, reference: &str, canonical: CanonicalStatus) -> Result<()> {
        let Some(payment) = self.payments.find_by_reference(reference).await? else {
            return Ok(());
        };
        if payment.status != PaymentStatus::Submitted {
            return Ok(());
        }

        match canonical {
            CanonicalStatus::Succeeded => {
                let Some(mut settled) = self
                    .payments
                    .advance_if(&payment.id, PaymentStatus::Submitted, PaymentStatus::Succeeded)
                    .await?
                else {
                    return Ok(());
                };
                if settled.transaction_reference.is_none() {
                    settled.set_transaction_reference(reference);
                }
                self.ensure_record(&settled, reference, canonical).await?;
                self.payments.upsert(settled.clone()).await?;
                info!(payment = %settled.id, reference, "submitted payment settled as succeeded");
            }
            CanonicalStatus::Failed => {
                let Some(mut settled) = self
                    .payments
                    .advance_if(&payment.id, PaymentStatus::Submitted, PaymentStatus::Failed)
                    .await?
                else {
                    return Ok(());
                };
                let restored = self
                    .wallets
                    .credit(&settled.wallet, settled.amount)
                    .await
                    .map_err(|err| {
                        PaymentError::Integrity(format!(
                            "debit of {} from wallet {} could not be refunded after the gateway reported failure: {err}",
                            settled.amount, settled.wallet
                        ))
                    })?;
                if settled.transaction_reference.is_none() {
                    settled.set_transaction_reference(reference);
                }
                self.ensure_record(&settled, reference, canonical).await?;
                self.payments.upsert(settled.clone()).await?;
                info!(
                    payment = %settled.id,
                    reference,
                    restored_balance = %restored,
                    "submitted payment settled as failed; refund applied"
                );
            }
            CanonicalStatus::Pending | CanonicalStatus::Processing => {
                // The transfer reached the gateway; make sure the local
                // record exists so the attempt is durably discoverable. The
                // payment itself is left alone: writing to it here would
                // race against a concurrent settlement claim.
                self.ensure_record(&payment, reference, canonical).await?;
            }
            CanonicalStatus::Unknown | CanonicalStatus::Indeterminate => {}
        }
        Ok(())
    }

    async fn ensure_record(
        &self,
        payment: &PendingPayment,
        reference: &str,
        status: CanonicalStatus,
    ) -> Result<()> {
        if self.records.get(reference).await?.is_some() {
            return Ok(());
        }
        let wallet = self.wallets.get(&payment.wallet).await?.ok_or_else(|| {
            PaymentError::Integrity(format!(
                "payment {} references missing wallet {}",
                payment.id, payment.wallet
            ))
        })?;
        self.records
            .insert(TransactionRecord::from_payment(
                payment,
                reference,
                &wallet.account_number,
                status,
                unix_ms(),
            ))
            .await
    }
}
