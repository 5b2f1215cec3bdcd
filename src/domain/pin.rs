use crate::error::AuthError;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::wallet::WalletId;

pub const PIN_LENGTH: usize = 4;

/// Format gate for user-entered PINs: exactly 4 decimal digits. Runs before
/// any store lookup so malformed input never costs a round-trip.
pub fn validate_pin_format(pin: &str) -> Result<(), AuthError> {
    if pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AuthError::InvalidFormat)
    }
}

/// Salted SHA-256 digest of a PIN. The plaintext is hashed at construction
/// and never stored or logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinHash {
    salt: [u8; 16],
    digest: [u8; 32],
}

impl PinHash {
    pub fn new(pin: &str) -> Self {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        Self::with_salt(salt, pin)
    }

    fn with_salt(salt: [u8; 16], pin: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(pin.as_bytes());
        Self {
            salt,
            digest: hasher.finalize().into(),
        }
    }

    /// Constant-time comparison against a candidate PIN.
    pub fn matches(&self, candidate: &str) -> bool {
        let probe = Self::with_salt(self.salt, candidate);
        self.digest.ct_eq(&probe.digest).into()
    }
}

/// The PIN record bound to a wallet. At most one active record per wallet;
/// the verifier treats anything else as an integrity violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPin {
    pub wallet: WalletId,
    pub pin: PinHash,
}

impl PaymentPin {
    pub fn new(wallet: WalletId, pin: &str) -> Result<Self, AuthError> {
        validate_pin_format(pin)?;
        Ok(Self {
            wallet,
            pin: PinHash::new(pin),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_format_boundaries() {
        assert!(validate_pin_format("0000").is_ok());
        assert!(validate_pin_format("9999").is_ok());
        assert_eq!(validate_pin_format("000"), Err(AuthError::InvalidFormat));
        assert_eq!(validate_pin_format("12a4"), Err(AuthError::InvalidFormat));
        assert_eq!(validate_pin_format("12345"), Err(AuthError::InvalidFormat));
        assert_eq!(validate_pin_format(""), Err(AuthError::InvalidFormat));
        assert_eq!(validate_pin_format("١٢٣٤"), Err(AuthError::InvalidFormat));
    }

    #[test]
    fn test_hash_matches_only_original_pin() {
        let hash = PinHash::new("4821");
        assert!(hash.matches("4821"));
        assert!(!hash.matches("4822"));
        assert!(!hash.matches(""));
    }

    #[test]
    fn test_fresh_salt_per_hash() {
        let a = PinHash::new("4821");
        let b = PinHash::new("4821");
        // Same PIN, different salt, both still verify.
        assert_ne!(a, b);
        assert!(a.matches("4821"));
        assert!(b.matches("4821"));
    }

    #[test]
    fn test_payment_pin_rejects_bad_format() {
        assert_eq!(
            PaymentPin::new(WalletId::new("w-1"), "12a4").unwrap_err(),
            AuthError::InvalidFormat
        );
    }
}
