use tracing::{info, warn};

use crate::domain::payment::PendingPayment;
use crate::domain::ports::{
    BankDirectory, BankDirectoryRef, ResolvedAccount, TransferGateway, TransferGatewayRef,
};
use crate::error::{PaymentError, Result};

/// Length of a destination account number on the gateway's rails.
const ACCOUNT_NUMBER_LEN: usize = 10;

/// Resolves destination account holder names through the gateway's
/// verification endpoint, and bank codes through the local directory.
#[derive(Clone)]
pub struct BankAccountResolver {
    gateway: TransferGatewayRef,
    banks: BankDirectoryRef,
}

impl BankAccountResolver {
    pub fn new(gateway: TransferGatewayRef, banks: BankDirectoryRef) -> Self {
        Self { gateway, banks }
    }

    /// Resolves the holder name for an account. Fails fast on a malformed
    /// account number so no round-trip is wasted.
    pub async fn resolve(&self, bank_code: &str, account_number: &str) -> Result<ResolvedAccount> {
        if account_number.len() != ACCOUNT_NUMBER_LEN
            || !account_number.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(PaymentError::Validation(format!(
                "destination account number must be exactly {ACCOUNT_NUMBER_LEN} digits"
            )));
        }
        self.gateway.resolve_account(bank_code, account_number).await
    }

    /// The bank code for a payment's destination: the one already captured,
    /// or a directory lookup by bank name.
    pub async fn bank_code_for(&self, payment: &PendingPayment) -> Result<String> {
        if let Some(code) = &payment.destination().bank_code {
            return Ok(code.clone());
        }
        let bank_name = &payment.destination().bank_name;
        match self.banks.code_for(bank_name).await? {
            Some(code) => Ok(code),
            None => Err(PaymentError::Validation(format!(
                "no bank code on record for {bank_name:?}"
            ))),
        }
    }

    /// Resolves the destination holder name and writes it back onto the
    /// payment. The write is guarded by a destination snapshot taken before
    /// the call: if any destination field changed in the meantime the stale
    /// result is dropped and `false` is returned.
    pub async fn resolve_for_payment(&self, payment: &mut PendingPayment) -> Result<bool> {
        let snapshot = payment.destination().clone();
        let bank_code = self.bank_code_for(payment).await?;
        let resolved = self.resolve(&bank_code, &snapshot.account_number).await?;

        let applied = payment.apply_resolved_name(&resolved.account_name, &snapshot);
        if applied {
            info!(
                payment = %payment.id,
                account = %snapshot.account_number,
                "destination account verified"
            );
        } else {
            warn!(
                payment = %payment.id,
                "destination changed while resolving; stale result dropped"
            );
        }
        Ok(applied)
    }
}
