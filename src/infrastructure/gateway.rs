use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::config::GatewayConfig;
use crate::domain::ports::{
    BankEntry, CreateWalletRequest, GatewayStatus, ProvisionedAccount, ResolvedAccount,
    TransferAcceptance, TransferGateway, TransferRequest,
};
use crate::error::{GatewayError, PaymentError, Result};

const RESOLVE_PATH: &str = "/core/bank/resolve";
const TRANSFERS_PATH: &str = "/virtual/transfers";
const TRANSFER_STATUS_PATH: &str = "/virtual/transfers/status";
const ACCOUNTS_PATH: &str = "/virtual/accounts/reserved";
const BANKS_PATH: &str = "/core/banks";

/// Maximum retry attempts after the initial request, reads only.
const MAX_RETRIES: u32 = 3;

/// Base delay between retries (doubles each attempt: 200ms, 400ms, 800ms).
const BASE_DELAY_MS: u64 = 200;

/// HTTP client for the banking gateway.
///
/// Idempotent reads (account resolution, status queries, the bank list) are
/// retried with exponential backoff on transport errors. Transfer submission
/// and wallet creation are sent exactly once: a lost response there is an
/// ambiguity the payment lifecycle has to own, not something a blind retry
/// may resolve into a double transfer.
#[derive(Clone)]
pub struct HttpTransferGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

/// Responses arrive wrapped in a `data` envelope; error bodies carry a
/// `message` field. Both shapes are tolerated when absent.
#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

impl HttpTransferGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Network {
                endpoint: config.base_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    fn transport_error(&self, endpoint: &str, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout {
                endpoint: endpoint.to_owned(),
                elapsed_ms: self.config.timeout.as_millis() as u64,
            }
        } else {
            GatewayError::Network {
                endpoint: endpoint.to_owned(),
                reason: err.to_string(),
            }
        }
    }

    async fn api_error(endpoint: &str, response: reqwest::Response) -> GatewayError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        match status {
            404 => GatewayError::NotFound {
                endpoint: endpoint.to_owned(),
            },
            429 => GatewayError::RateLimited {
                endpoint: endpoint.to_owned(),
            },
            _ => GatewayError::Api {
                endpoint: endpoint.to_owned(),
                status,
                body: extract_message(&body),
            },
        }
    }

    async fn decode<T: DeserializeOwned>(endpoint: &str, response: reqwest::Response) -> Result<T> {
        let body = response.text().await.map_err(|e| GatewayError::Malformed {
            endpoint: endpoint.to_owned(),
            reason: e.to_string(),
        })?;
        // Enveloped first, bare second.
        if let Ok(envelope) = serde_json::from_str::<Envelope<T>>(&body) {
            return Ok(envelope.data);
        }
        serde_json::from_str::<T>(&body).map_err(|e| {
            PaymentError::Gateway(GatewayError::Malformed {
                endpoint: endpoint.to_owned(),
                reason: e.to_string(),
            })
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.url(endpoint);
        let response = retry_send(|| {
            self.client
                .get(&url)
                .bearer_auth(&self.config.bearer_token)
                .query(query)
                .send()
        })
        .await
        .map_err(|e| self.transport_error(endpoint, e))?;

        if !response.status().is_success() {
            return Err(Self::api_error(endpoint, response).await.into());
        }
        Self::decode(endpoint, response).await
    }
}

#[async_trait]
impl TransferGateway for HttpTransferGateway {
    async fn resolve_account(
        &self,
        bank_code: &str,
        account_number: &str,
    ) -> Result<ResolvedAccount> {
        let resolved: ResolvedAccount = self
            .get_json(
                RESOLVE_PATH,
                &[("bankCode", bank_code), ("accountNumber", account_number)],
            )
            .await?;
        if resolved.account_name.trim().is_empty() {
            return Err(GatewayError::NotFound {
                endpoint: RESOLVE_PATH.to_owned(),
            }
            .into());
        }
        Ok(resolved)
    }

    async fn submit_transfer(&self, request: TransferRequest) -> Result<TransferAcceptance> {
        let response = self
            .client
            .post(self.url(TRANSFERS_PATH))
            .bearer_auth(&self.config.bearer_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(TRANSFERS_PATH, e))?;

        if !response.status().is_success() {
            return Err(Self::api_error(TRANSFERS_PATH, response).await.into());
        }
        Self::decode(TRANSFERS_PATH, response).await
    }

    async fn query_status(&self, reference: &str) -> Result<GatewayStatus> {
        self.get_json(TRANSFER_STATUS_PATH, &[("transactionReference", reference)])
            .await
    }

    async fn create_wallet(&self, request: CreateWalletRequest) -> Result<ProvisionedAccount> {
        let response = self
            .client
            .post(self.url(ACCOUNTS_PATH))
            .bearer_auth(&self.config.bearer_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(ACCOUNTS_PATH, e))?;

        if !response.status().is_success() {
            return Err(Self::api_error(ACCOUNTS_PATH, response).await.into());
        }
        Self::decode(ACCOUNTS_PATH, response).await
    }

    async fn list_banks(&self) -> Result<Vec<BankEntry>> {
        self.get_json(BANKS_PATH, &[]).await
    }
}

/// Pulls the gateway's human-readable `message` field out of an error body,
/// falling back to the raw body.
fn extract_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message")?.as_str().map(str::to_owned))
        .unwrap_or_else(|| body.to_owned())
}

/// Sends a request with exponential backoff on transport errors. Only used
/// for idempotent reads; the caller inspects the response status itself.
async fn retry_send<F, Fut>(f: F) -> std::result::Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..MAX_RETRIES {
        match f().await {
            Ok(response) => return Ok(response),
            Err(e) => {
                let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
                warn!(
                    attempt = attempt + 1,
                    max_retries = MAX_RETRIES,
                    "gateway request failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
    f().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_message_prefers_message_field() {
        assert_eq!(
            extract_message(r#"{"message":"insufficient gateway float","code":"E42"}"#),
            "insufficient gateway float"
        );
        assert_eq!(extract_message("upstream exploded"), "upstream exploded");
    }

    #[test]
    fn test_envelope_and_bare_decoding_shapes() {
        let enveloped = r#"{"data":{"transactionReference":"TRF-1","status":"PENDING"}}"#;
        let envelope: Envelope<TransferAcceptance> = serde_json::from_str(enveloped).unwrap();
        assert_eq!(envelope.data.transaction_reference, "TRF-1");

        let bare = r#"{"transactionReference":"TRF-2"}"#;
        let acceptance: TransferAcceptance = serde_json::from_str(bare).unwrap();
        assert_eq!(acceptance.transaction_reference, "TRF-2");
        assert_eq!(acceptance.status, None);
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_a_transient_error() {
        // Port 1 is never listening: connection refused, quickly.
        let config = GatewayConfig::new("http://127.0.0.1:1", "token")
            .with_timeout(Duration::from_millis(200));
        let gateway = HttpTransferGateway::new(config).unwrap();

        let err = gateway.query_status("TRF-1").await.unwrap_err();
        match err {
            PaymentError::Gateway(g) => assert!(g.is_transient()),
            other => panic!("expected a gateway error, got {other:?}"),
        }
    }
}
