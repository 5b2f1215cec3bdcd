use serde::{Deserialize, Serialize};
use std::fmt;

use super::payment::PendingPayment;
use super::wallet::Amount;

/// The normalized transaction state used internally regardless of the
/// gateway's raw terminology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    /// The source answered with vocabulary we do not recognize.
    Unknown,
    /// The source could not be checked at all. Never conflated with Failed.
    Indeterminate,
}

impl CanonicalStatus {
    /// Normalizes a status string from the gateway vocabulary,
    /// case-insensitively. Unmapped values become `Unknown` rather than an
    /// error.
    pub fn from_vocabulary(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SUCCESSFUL" | "SUCCESS" | "SUCCEEDED" => Self::Succeeded,
            "PENDING" => Self::Pending,
            "PROCESSING" => Self::Processing,
            // The gateway distinguishes cancellations; this system does not.
            "FAILED" | "FAILURE" | "CANCELLED" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
            Self::Indeterminate => "Indeterminate",
        };
        f.write_str(name)
    }
}

/// Local record of a dispatch attempt that reached the gateway. The identity
/// fields never change after insertion; only the canonical status progresses
/// as reconciliation learns more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub reference: String,
    pub amount: Amount,
    pub destination_bank: String,
    pub destination_account_number: String,
    pub destination_account_name: Option<String>,
    pub source_account_number: String,
    pub narration: Option<String>,
    pub status: CanonicalStatus,
    pub created_at_ms: u64,
}

impl TransactionRecord {
    /// Snapshots a payment into its record. The caller supplies the clock so
    /// the domain stays deterministic under test.
    pub fn from_payment(
        payment: &PendingPayment,
        reference: impl Into<String>,
        source_account_number: impl Into<String>,
        status: CanonicalStatus,
        created_at_ms: u64,
    ) -> Self {
        Self {
            reference: reference.into(),
            amount: payment.amount,
            destination_bank: payment.destination().bank_name.clone(),
            destination_account_number: payment.destination().account_number.clone(),
            destination_account_name: payment.resolved_account_name().map(str::to_owned),
            source_account_number: source_account_number.into(),
            narration: payment.narration.clone(),
            status,
            created_at_ms,
        }
    }
}
