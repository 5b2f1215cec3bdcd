use tracing::warn;

use crate::domain::pin::{validate_pin_format, PaymentPin};
use crate::domain::ports::{PinStore, PinStoreRef};
use crate::domain::wallet::WalletId;
use crate::error::{AuthError, PaymentError, Result};

/// Verifies the transaction PIN gating a wallet's outgoing payments.
///
/// Verification is a pure read: it never mutates the stored record, never
/// logs the supplied value, and carries no attempt counters, so the outcome
/// depends only on the supplied PIN and the stored hash.
#[derive(Clone)]
pub struct PinVerifier {
    pins: PinStoreRef,
}

impl PinVerifier {
    pub fn new(pins: PinStoreRef) -> Self {
        Self { pins }
    }

    pub async fn verify(&self, wallet: &WalletId, supplied: &str) -> Result<()> {
        // Format gate first: malformed input never costs a lookup.
        validate_pin_format(supplied)?;

        let records = self.pins.find_by_wallet(wallet).await?;
        let record = match records.as_slice() {
            [] => return Err(AuthError::PinNotConfigured.into()),
            [record] => record,
            many => {
                warn!(wallet = %wallet, count = many.len(), "duplicate PIN records");
                return Err(PaymentError::Integrity(format!(
                    "wallet {wallet} has {} PIN records, expected exactly one",
                    many.len()
                )));
            }
        };

        if record.pin.matches(supplied) {
            Ok(())
        } else {
            Err(AuthError::IncorrectPin.into())
        }
    }

    /// Creates the one-and-only PIN record for a wallet.
    pub async fn setup(&self, wallet: WalletId, pin: &str) -> Result<()> {
        validate_pin_format(pin)?;
        if !self.pins.find_by_wallet(&wallet).await?.is_empty() {
            return Err(AuthError::AlreadyConfigured.into());
        }
        self.pins.insert(PaymentPin::new(wallet, pin)?).await
    }

    /// Rotates the PIN. Requires the current PIN and a genuinely new value;
    /// the replacement is hashed with a fresh salt before it is stored.
    pub async fn change(&self, wallet: &WalletId, current: &str, new: &str) -> Result<()> {
        self.verify(wallet, current).await?;
        validate_pin_format(new)?;
        if new == current {
            return Err(AuthError::NoOpChange.into());
        }
        self.pins.replace(PaymentPin::new(wallet.clone(), new)?).await
    }
}
