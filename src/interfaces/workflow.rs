use crate::domain::payment::{Destination, PaymentStatus, PendingPayment};
use crate::domain::pin::validate_pin_format;
use crate::domain::wallet::WalletId;
use crate::error::{PaymentError, Result};

/// One prompt in the payment flow. Each step consumes exactly one typed
/// input and yields the next; there are no callbacks to chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    WalletSelection,
    PinEntry,
    Confirmation,
}

/// The UI-facing payment flow: WalletSelection → PinEntry → Confirmation.
///
/// The workflow owns a snapshot of the last-committed destination, so
/// detecting edits is an explicit comparison rather than shared mutable
/// state tracking "original" field values. Cancelling at any step hands the
/// draft payment back untouched.
pub struct PaymentWorkflow {
    payment: PendingPayment,
    committed: Destination,
    step: Step,
    pin: Option<String>,
}

impl PaymentWorkflow {
    /// Starts the flow. Only a draft payment can enter it.
    pub fn begin(payment: PendingPayment) -> Result<Self> {
        if payment.status != PaymentStatus::Draft {
            return Err(PaymentError::Validation(format!(
                "workflow requires a draft payment, got {}",
                payment.status
            )));
        }
        let committed = payment.destination().clone();
        Ok(Self {
            payment,
            committed,
            step: Step::WalletSelection,
            pin: None,
        })
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn payment(&self) -> &PendingPayment {
        &self.payment
    }

    pub fn select_wallet(&mut self, wallet: WalletId) -> Result<()> {
        self.expect(Step::WalletSelection)?;
        self.payment.wallet = wallet;
        self.step = Step::PinEntry;
        Ok(())
    }

    /// Accepts the PIN for the confirmation step. The format gate runs here
    /// so a typo is caught at the prompt; the verifier re-checks during
    /// dispatch either way.
    pub fn enter_pin(&mut self, pin: &str) -> Result<()> {
        self.expect(Step::PinEntry)?;
        validate_pin_format(pin)?;
        self.pin = Some(pin.to_owned());
        self.step = Step::Confirmation;
        Ok(())
    }

    /// Destination fields edited since the last commit. Non-empty means any
    /// previously resolved account name is stale and resolution must re-run
    /// before confirmation.
    pub fn dirty_fields(&self) -> Vec<&'static str> {
        let current = self.payment.destination();
        let mut dirty = Vec::new();
        if current.account_number != self.committed.account_number {
            dirty.push("destination_account_number");
        }
        if current.bank_code != self.committed.bank_code {
            dirty.push("destination_bank_code");
        }
        if current.bank_name != self.committed.bank_name {
            dirty.push("destination_bank");
        }
        dirty
    }

    /// Applies a destination edit. The payment clears its resolved account
    /// name on any actual change.
    pub fn update_destination(&mut self, destination: Destination) {
        self.payment.set_destination(destination);
    }

    /// Re-baselines the snapshot after the destination has been re-verified.
    pub fn commit_destination(&mut self) {
        self.committed = self.payment.destination().clone();
    }

    /// Confirms the flow, yielding the payment and PIN for the dispatcher.
    pub fn confirm(mut self) -> Result<(PendingPayment, String)> {
        self.expect(Step::Confirmation)?;
        if !self.dirty_fields().is_empty() {
            return Err(PaymentError::Validation(
                "destination changed since it was last verified; re-run account resolution"
                    .to_string(),
            ));
        }
        let pin = self.pin.take().ok_or_else(|| {
            PaymentError::Integrity("confirmation step reached without a PIN".to_string())
        })?;
        Ok((self.payment, pin))
    }

    /// Abandons the flow at any step; the payment returns as the draft it
    /// entered as.
    pub fn cancel(self) -> PendingPayment {
        self.payment
    }

    fn expect(&self, step: Step) -> Result<()> {
        if self.step == step {
            Ok(())
        } else {
            Err(PaymentError::Validation(format!(
                "input does not belong to the current step ({:?})",
                self.step
            )))
        }
    }
}
