use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaymentError>;

#[derive(Debug, Error)]
pub enum PaymentError {
    /// Bad input shape. Never reaches an external call.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Terminal for this attempt; no external call was made.
    #[error("insufficient funds: balance is {balance}, tried to transfer {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Business rejection from the gateway. Not retryable.
    #[error("transfer rejected by gateway ({code}): {message}")]
    GatewayRejection { code: u16, message: String },

    /// A data invariant was violated. Requires operator intervention and
    /// must never be resolved silently.
    #[error("data integrity violation: {0}")]
    Integrity(String),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

impl PaymentError {
    /// Transient failures are safe for the caller to retry as a fresh
    /// attempt; the engine never retries a submission on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Gateway(g) if g.is_transient())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("PIN must be exactly 4 digits")]
    InvalidFormat,
    #[error("no PIN is configured for this wallet")]
    PinNotConfigured,
    #[error("a PIN is already configured for this wallet")]
    AlreadyConfigured,
    #[error("incorrect PIN")]
    IncorrectPin,
    #[error("new PIN must differ from the current PIN")]
    NoOpChange,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway unreachable at {endpoint}: {reason}")]
    Network { endpoint: String, reason: String },

    /// Ambiguous: the request may or may not have been executed.
    #[error("gateway request to {endpoint} timed out after {elapsed_ms}ms")]
    Timeout { endpoint: String, elapsed_ms: u64 },

    #[error("gateway rate limit hit on {endpoint}")]
    RateLimited { endpoint: String },

    #[error("not found at gateway: {endpoint}")]
    NotFound { endpoint: String },

    #[error("gateway {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("malformed response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => (500..=599).contains(status),
            Self::NotFound { .. } | Self::Malformed { .. } => false,
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PaymentError {
    fn from(e: rocksdb::Error) -> Self {
        Self::Store(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_transience() {
        let timeout = GatewayError::Timeout {
            endpoint: "/virtual/transfers".into(),
            elapsed_ms: 30_000,
        };
        assert!(timeout.is_transient());

        let server_error = GatewayError::Api {
            endpoint: "/virtual/transfers".into(),
            status: 502,
            body: "bad gateway".into(),
        };
        assert!(server_error.is_transient());

        let rejection = GatewayError::Api {
            endpoint: "/virtual/transfers".into(),
            status: 400,
            body: "invalid destination".into(),
        };
        assert!(!rejection.is_transient());

        assert!(
            !GatewayError::NotFound {
                endpoint: "/core/bank/resolve".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_payment_error_transience() {
        let err = PaymentError::Gateway(GatewayError::Network {
            endpoint: "/core/banks".into(),
            reason: "connection refused".into(),
        });
        assert!(err.is_transient());

        let err = PaymentError::GatewayRejection {
            code: 422,
            message: "account closed".into(),
        };
        assert!(!err.is_transient());
    }
}
