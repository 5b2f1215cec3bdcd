use crate::error::PaymentError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Number of digits in a national identity reference.
const IDENTITY_REF_LEN: usize = 11;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WalletId(String);

impl WalletId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A wallet balance. May be zero, never negative through the ledger ops.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Balance {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl From<Balance> for Decimal {
    fn from(balance: Balance) -> Self {
        balance.0
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A positive monetary amount for transfers.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::Validation(
                "amount must be greater than zero".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// National identity reference: exactly 11 decimal digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRef(String);

impl IdentityRef {
    pub fn new(raw: &str) -> Result<Self, PaymentError> {
        let raw = raw.trim();
        if raw.len() == IDENTITY_REF_LEN && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw.to_owned()))
        } else {
            Err(PaymentError::Validation(format!(
                "identity reference must be exactly {IDENTITY_REF_LEN} digits"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum WalletState {
    Uninitialized,
    Provisioned,
}

/// Outcome of an atomic check-and-debit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DebitOutcome {
    Debited { new_balance: Balance },
    InsufficientFunds { balance: Balance },
}

/// A balance-holding account internal to this system.
///
/// The balance is only ever mutated through the ledger's atomic operations;
/// nothing outside a store implementation calls `try_debit`/`credit` on the
/// struct directly.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Wallet {
    pub id: WalletId,
    pub holder_name: String,
    pub identity_ref: IdentityRef,
    pub account_number: String,
    pub balance: Balance,
    pub state: WalletState,
}

impl Wallet {
    /// A wallet that exists locally but has not been provisioned with the
    /// gateway yet. It cannot send payments.
    pub fn draft(id: WalletId, holder_name: impl Into<String>, identity_ref: IdentityRef) -> Self {
        Self {
            id,
            holder_name: holder_name.into(),
            identity_ref,
            account_number: String::new(),
            balance: Balance::ZERO,
            state: WalletState::Uninitialized,
        }
    }

    pub fn provisioned(
        id: WalletId,
        holder_name: impl Into<String>,
        identity_ref: IdentityRef,
        account_number: impl Into<String>,
    ) -> Self {
        Self {
            id,
            holder_name: holder_name.into(),
            identity_ref,
            account_number: account_number.into(),
            balance: Balance::ZERO,
            state: WalletState::Provisioned,
        }
    }

    /// Check-and-decrement. Callers must hold whatever lock makes this
    /// atomic with respect to concurrent attempts on the same wallet.
    pub fn try_debit(&mut self, amount: Amount) -> DebitOutcome {
        let amount = Balance::from(amount);
        if self.balance >= amount {
            self.balance -= amount;
            DebitOutcome::Debited {
                new_balance: self.balance,
            }
        } else {
            DebitOutcome::InsufficientFunds {
                balance: self.balance,
            }
        }
    }

    pub fn credit(&mut self, amount: Amount) -> Balance {
        self.balance += Balance::from(amount);
        self.balance
    }
}
