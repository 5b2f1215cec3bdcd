use std::env;
use std::time::Duration;
use thiserror::Error;

pub const ENV_GATEWAY_URL: &str = "WALLETPAY_GATEWAY_URL";
pub const ENV_GATEWAY_TOKEN: &str = "WALLETPAY_GATEWAY_TOKEN";
pub const ENV_GATEWAY_TIMEOUT_SECS: &str = "WALLETPAY_GATEWAY_TIMEOUT_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {reason}")]
    InvalidVar { var: &'static str, reason: String },
}

/// Connection settings for the banking gateway.
///
/// The bearer token authenticates every request and never appears in logs.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub bearer_token: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            bearer_token: bearer_token.into().trim().to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            env::var(ENV_GATEWAY_URL).map_err(|_| ConfigError::MissingVar(ENV_GATEWAY_URL))?;
        let token =
            env::var(ENV_GATEWAY_TOKEN).map_err(|_| ConfigError::MissingVar(ENV_GATEWAY_TOKEN))?;
        if token.trim().is_empty() {
            return Err(ConfigError::InvalidVar {
                var: ENV_GATEWAY_TOKEN,
                reason: "token is empty".into(),
            });
        }

        let mut config = Self::new(base_url, token);
        if let Ok(raw) = env::var(ENV_GATEWAY_TIMEOUT_SECS) {
            let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidVar {
                var: ENV_GATEWAY_TIMEOUT_SECS,
                reason: format!("expected an integer number of seconds, got {raw:?}"),
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}
