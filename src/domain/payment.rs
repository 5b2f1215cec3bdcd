use crate::error::PaymentError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::wallet::{Amount, WalletId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaymentId(String);

impl PaymentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh identifier, unique enough to double as the gateway-facing
    /// client reference for the attempt.
    pub fn generate() -> Self {
        let nonce: u64 = rand::thread_rng().r#gen();
        Self(format!("PAY-{nonce:016x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the money goes. The bank code may be absent until the directory
/// lookup fills it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub account_number: String,
    pub bank_code: Option<String>,
    pub bank_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Draft,
    PinPending,
    Authorized,
    Submitted,
    Succeeded,
    Failed,
    InsufficientFunds,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::InsufficientFunds)
    }

    fn allows(self, next: Self) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Draft, PinPending)
                | (PinPending, Authorized)
                // PIN missing entirely: the attempt halts.
                | (PinPending, Failed)
                | (Authorized, Submitted)
                | (Authorized, InsufficientFunds)
                | (Submitted, Succeeded)
                | (Submitted, Failed)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Draft => "draft",
            Self::PinPending => "pin-pending",
            Self::Authorized => "authorized",
            Self::Submitted => "submitted",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::InsufficientFunds => "insufficient-funds",
        };
        f.write_str(name)
    }
}

/// A single transfer attempt moving through the payment state machine.
///
/// The destination and the resolved account name are private so every
/// mutation goes through the invalidation rule: changing any destination
/// field clears a previously verified holder name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPayment {
    pub id: PaymentId,
    pub wallet: WalletId,
    destination: Destination,
    resolved_account_name: Option<String>,
    pub amount: Amount,
    pub narration: Option<String>,
    pub transaction_reference: Option<String>,
    pub status: PaymentStatus,
}

impl PendingPayment {
    pub fn new(id: PaymentId, wallet: WalletId, destination: Destination, amount: Amount) -> Self {
        Self {
            id,
            wallet,
            destination,
            resolved_account_name: None,
            amount,
            narration: None,
            transaction_reference: None,
            status: PaymentStatus::Draft,
        }
    }

    pub fn with_narration(mut self, narration: impl Into<String>) -> Self {
        self.narration = Some(narration.into());
        self
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn resolved_account_name(&self) -> Option<&str> {
        self.resolved_account_name.as_deref()
    }

    pub fn set_destination(&mut self, destination: Destination) {
        if self.destination != destination {
            self.destination = destination;
            self.resolved_account_name = None;
        }
    }

    pub fn set_destination_account(&mut self, account_number: impl Into<String>) {
        let account_number = account_number.into();
        if self.destination.account_number != account_number {
            self.destination.account_number = account_number;
            self.resolved_account_name = None;
        }
    }

    pub fn set_destination_bank(&mut self, bank_name: impl Into<String>, bank_code: Option<String>) {
        let bank_name = bank_name.into();
        if self.destination.bank_name != bank_name || self.destination.bank_code != bank_code {
            self.destination.bank_name = bank_name;
            self.destination.bank_code = bank_code;
            self.resolved_account_name = None;
        }
    }

    /// Applies a resolution result only if the destination it was requested
    /// for is still current. Returns false when the stale result is dropped.
    pub fn apply_resolved_name(
        &mut self,
        name: impl Into<String>,
        requested_for: &Destination,
    ) -> bool {
        if &self.destination == requested_for {
            self.resolved_account_name = Some(name.into());
            true
        } else {
            false
        }
    }

    pub fn set_transaction_reference(&mut self, reference: impl Into<String>) {
        self.transaction_reference = Some(reference.into());
    }

    /// Moves to `next`, enforcing the transition table.
    pub fn advance(&mut self, next: PaymentStatus) -> Result<(), PaymentError> {
        if self.status.allows(next) {
            self.status = next;
            Ok(())
        } else {
            Err(PaymentError::Validation(format!(
                "payment {} cannot move from {} to {}",
                self.id, self.status, next
            )))
        }
    }

    /// Returns the payment to draft. Only legal before the debit: once the
    /// attempt is submitted the compensating-refund path is the sole way
    /// back.
    pub fn cancel(&mut self) -> Result<(), PaymentError> {
        match self.status {
            PaymentStatus::Draft => Ok(()),
            PaymentStatus::PinPending | PaymentStatus::Authorized => {
                self.status = PaymentStatus::Draft;
                Ok(())
            }
            other => Err(PaymentError::Validation(format!(
                "payment {} cannot be cancelled from {}",
                self.id, other
            ))),
        }
    }
}
