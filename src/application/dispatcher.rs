use tracing::{info, warn};

use super::resolver::BankAccountResolver;
use super::unix_ms;
use super::verifier::PinVerifier;
use crate::domain::payment::{PaymentId, PaymentStatus, PendingPayment};
use crate::domain::ports::{
    PaymentStore, PaymentStoreRef, RecordStoreRef, TransactionRecordStore, TransferGateway,
    TransferGatewayRef, TransferRequest, WalletStore, WalletStoreRef,
};
use crate::domain::transaction::{CanonicalStatus, TransactionRecord};
use crate::domain::wallet::{DebitOutcome, Wallet, WalletState};
use crate::error::{AuthError, GatewayError, PaymentError, Result};

const DEFAULT_NARRATION: &str = "Payment Transfer";

/// Orchestrates a payment attempt: verify PIN, debit the wallet atomically,
/// submit the transfer, record the outcome.
///
/// Ordering guarantees: the debit commits before the gateway call is issued,
/// and the transaction reference is persisted before success is reported, so
/// any crash or timeout in between is discoverable through reconciliation.
#[derive(Clone)]
pub struct PaymentDispatcher {
    wallets: WalletStoreRef,
    payments: PaymentStoreRef,
    records: RecordStoreRef,
    gateway: TransferGatewayRef,
    verifier: PinVerifier,
    resolver: BankAccountResolver,
}

impl PaymentDispatcher {
    pub fn new(
        wallets: WalletStoreRef,
        payments: PaymentStoreRef,
        records: RecordStoreRef,
        gateway: TransferGatewayRef,
        verifier: PinVerifier,
        resolver: BankAccountResolver,
    ) -> Self {
        Self {
            wallets,
            payments,
            records,
            gateway,
            verifier,
            resolver,
        }
    }

    /// Drives a payment through authorization and submission.
    ///
    /// The stored copy of the payment is the source of truth; on every exit
    /// path its state has already been persisted. Re-promptable PIN failures
    /// leave it in `PinPending`; a timed-out submission leaves it
    /// `Submitted` for the reconciler.
    pub async fn dispatch(
        &self,
        payment: PendingPayment,
        supplied_pin: &str,
    ) -> Result<PendingPayment> {
        let id = payment.id.clone();
        let stored = self.payments.insert_or_get(payment).await?;

        match stored.status {
            PaymentStatus::Draft => {
                if self
                    .payments
                    .advance_if(&id, PaymentStatus::Draft, PaymentStatus::PinPending)
                    .await?
                    .is_none()
                {
                    return Err(PaymentError::Validation(format!(
                        "payment {id} is already being dispatched"
                    )));
                }
            }
            PaymentStatus::PinPending => {}
            other => {
                return Err(PaymentError::Validation(format!(
                    "payment {id} cannot be dispatched from state {other}"
                )));
            }
        }

        // PIN gate. A wallet without a PIN can never authorize: terminal.
        // Format and mismatch errors leave the payment awaiting a re-prompt.
        match self.verifier.verify(&stored.wallet, supplied_pin).await {
            Ok(()) => {}
            Err(err @ PaymentError::Auth(AuthError::PinNotConfigured)) => {
                if let Some(p) = self
                    .payments
                    .advance_if(&id, PaymentStatus::PinPending, PaymentStatus::Failed)
                    .await?
                {
                    warn!(payment = %p.id, wallet = %p.wallet, "payment halted: wallet has no PIN configured");
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        }

        // Read-only validation happens before the authorization claim, so a
        // failure here leaves the payment re-promptable instead of stranded.
        let wallet = self.wallets.get(&stored.wallet).await?.ok_or_else(|| {
            PaymentError::Validation(format!("wallet {} not found", stored.wallet))
        })?;
        if wallet.state != WalletState::Provisioned {
            return Err(PaymentError::Validation(format!(
                "wallet {} is not provisioned",
                wallet.id
            )));
        }
        let bank_code = self.resolver.bank_code_for(&stored).await?;

        let Some(authorized) = self
            .payments
            .advance_if(&id, PaymentStatus::PinPending, PaymentStatus::Authorized)
            .await?
        else {
            return Err(PaymentError::Validation(format!(
                "payment {id} was claimed by a concurrent dispatch"
            )));
        };

        // Atomic check-and-debit. On insufficient funds the gateway is never
        // contacted and no partial debit exists.
        match self
            .wallets
            .try_debit(&authorized.wallet, authorized.amount)
            .await?
        {
            DebitOutcome::InsufficientFunds { balance } => {
                self.payments
                    .advance_if(
                        &id,
                        PaymentStatus::Authorized,
                        PaymentStatus::InsufficientFunds,
                    )
                    .await?;
                warn!(
                    payment = %id,
                    wallet = %authorized.wallet,
                    balance = %balance,
                    requested = %authorized.amount,
                    "insufficient funds"
                );
                return Err(PaymentError::InsufficientFunds {
                    balance: balance.into(),
                    requested: authorized.amount.value(),
                });
            }
            DebitOutcome::Debited { new_balance } => {
                info!(
                    payment = %id,
                    wallet = %authorized.wallet,
                    new_balance = %new_balance,
                    "wallet debited"
                );
            }
        }

        // The committed debit is recorded as `Submitted` before the external
        // call goes out; a crash from here on is reconcilable.
        let Some(submitted) = self
            .payments
            .advance_if(&id, PaymentStatus::Authorized, PaymentStatus::Submitted)
            .await?
        else {
            return Err(PaymentError::Integrity(format!(
                "payment {id} changed state during debit"
            )));
        };

        let request = TransferRequest {
            destination_bank_code: bank_code,
            destination_account_number: submitted.destination().account_number.clone(),
            amount: submitted.amount.value(),
            source_account_number: wallet.account_number.clone(),
            narration: submitted
                .narration
                .clone()
                .unwrap_or_else(|| DEFAULT_NARRATION.to_owned()),
            client_reference: submitted.id.as_str().to_owned(),
        };

        match self.gateway.submit_transfer(request).await {
            Ok(acceptance) if !acceptance.transaction_reference.is_empty() => {
                self.complete(submitted, &wallet, acceptance.transaction_reference, acceptance.status)
                    .await
            }
            Ok(_) => {
                // Accepted without a reference: contract violation, treated
                // as a rejection.
                self.refund_and_fail(&id, &submitted).await?;
                Err(PaymentError::GatewayRejection {
                    code: 200,
                    message: "gateway accepted the transfer without a transaction reference".into(),
                })
            }
            Err(PaymentError::Gateway(err @ GatewayError::Timeout { .. })) => {
                // Ambiguous: the transfer may have executed. No refund until
                // the gateway can be queried; reconciliation owns the
                // correction.
                warn!(payment = %id, "transfer submission timed out; payment stays submitted pending reconciliation");
                Err(PaymentError::Gateway(err))
            }
            Err(PaymentError::Gateway(GatewayError::Api { status, body, .. }))
                if (400..500).contains(&status) =>
            {
                self.refund_and_fail(&id, &submitted).await?;
                Err(PaymentError::GatewayRejection {
                    code: status,
                    message: body,
                })
            }
            Err(err) => {
                // Definite non-execution (connect failure, 5xx, malformed
                // reply): restore the balance before reporting the failure.
                self.refund_and_fail(&id, &submitted).await?;
                Err(err)
            }
        }
    }

    async fn complete(
        &self,
        payment: PendingPayment,
        wallet: &Wallet,
        reference: String,
        gateway_status: Option<String>,
    ) -> Result<PendingPayment> {
        let record_status = gateway_status
            .as_deref()
            .map(CanonicalStatus::from_vocabulary)
            .filter(|s| *s != CanonicalStatus::Unknown)
            .unwrap_or(CanonicalStatus::Pending);

        // Claim the terminal transition; a concurrent reconcile may have
        // settled the payment from a gateway verdict already.
        let Some(mut settled) = self
            .payments
            .advance_if(&payment.id, PaymentStatus::Submitted, PaymentStatus::Succeeded)
            .await?
        else {
            return self.payments.get(&payment.id).await?.ok_or_else(|| {
                PaymentError::Integrity(format!("payment {} vanished mid-dispatch", payment.id))
            });
        };

        settled.set_transaction_reference(reference.clone());
        self.records
            .insert(TransactionRecord::from_payment(
                &settled,
                &reference,
                &wallet.account_number,
                record_status,
                unix_ms(),
            ))
            .await?;
        self.payments.upsert(settled.clone()).await?;
        info!(
            payment = %settled.id,
            reference = %reference,
            amount = %settled.amount,
            "transfer accepted by gateway"
        );
        Ok(settled)
    }

    /// Compensating credit after a definite gateway failure. Claims the
    /// Submitted → Failed transition first so concurrent settlement flows
    /// can never refund the same debit twice; a failed credit escalates to
    /// an integrity error instead of silently dropping the money.
    async fn refund_and_fail(&self, id: &PaymentId, payment: &PendingPayment) -> Result<()> {
        if self
            .payments
            .advance_if(id, PaymentStatus::Submitted, PaymentStatus::Failed)
            .await?
            .is_none()
        {
            return Ok(());
        }
        match self.wallets.credit(&payment.wallet, payment.amount).await {
            Ok(balance) => {
                info!(
                    payment = %id,
                    wallet = %payment.wallet,
                    restored_balance = %balance,
                    "compensating refund applied"
                );
                Ok(())
            }
            Err(err) => Err(PaymentError::Integrity(format!(
                "debit of {} from wallet {} could not be refunded after gateway failure: {err}",
                payment.amount, payment.wallet
            ))),
        }
    }
}
