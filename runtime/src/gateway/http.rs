//! HTTP transport for the payment gateway.

use super::{status_endpoint, status_token};
use crate::config::GatewayConfig;
use booking_core::environment::{PaymentGateway, SignedPayload};
use booking_core::error::{BookingError, Result};
use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `reqwest` client implementing [`PaymentGateway`].
///
/// - `POST {base}/pg/v1/pay` with the signed request and `X-VERIFY`
/// - `GET {base}/pg/v1/status/{merchant}/{transaction}` with `X-VERIFY` and `X-MERCHANT-ID`
///
/// Every request is bounded by the client timeout.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    config: GatewayConfig,
    http_client: Client,
    timeout: Duration,
}

impl std::fmt::Debug for HttpPaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPaymentGateway")
            .field("base_url", &self.config.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct PayBody<'a> {
    request: &'a str,
}

#[derive(Deserialize)]
struct GatewayResponse<T> {
    success: bool,
    code: String,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayData {
    instrument_response: InstrumentResponse,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentResponse {
    redirect_info: RedirectInfo,
}

#[derive(Deserialize)]
struct RedirectInfo {
    url: String,
}

#[derive(Deserialize)]
struct StatusData {
    state: Option<String>,
}

impl HttpPaymentGateway {
    /// Creates a client for the configured gateway.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::GatewayConfig`] if the HTTP client cannot be built.
    pub fn new(config: GatewayConfig, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BookingError::GatewayConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            config,
            http_client,
            timeout,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.config.base_url.trim_end_matches('/'))
    }

    fn transport_error(&self, error: &reqwest::Error) -> BookingError {
        if error.is_timeout() {
            BookingError::GatewayTimeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            BookingError::Gateway(error.to_string())
        }
    }

    async fn pay(&self, payload: SignedPayload) -> Result<String> {
        let response = self
            .http_client
            .post(self.url(&payload.endpoint))
            .header("X-VERIFY", &payload.checksum)
            .json(&PayBody {
                request: &payload.request,
            })
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(transaction_id = %payload.transaction_id, %status, body = %body, "Gateway pay request failed");
            return Err(BookingError::Gateway(format!("pay request returned {status}")));
        }

        let parsed: GatewayResponse<PayData> = response
            .json()
            .await
            .map_err(|e| BookingError::Gateway(format!("unreadable pay response: {e}")))?;
        match (parsed.success, parsed.data) {
            (true, Some(data)) => Ok(data.instrument_response.redirect_info.url),
            _ => Err(BookingError::Gateway(format!(
                "pay request rejected: {} {}",
                parsed.code,
                parsed.message.unwrap_or_default()
            ))),
        }
    }

    async fn status(&self, transaction_id: String) -> Result<String> {
        let endpoint = status_endpoint(&self.config.merchant_id, &transaction_id);
        let response = self
            .http_client
            .get(self.url(&endpoint))
            .header("X-VERIFY", status_token(&self.config, &transaction_id))
            .header("X-MERCHANT-ID", &self.config.merchant_id)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(BookingError::Gateway(format!("status query returned {status}")));
        }

        let parsed: GatewayResponse<StatusData> = response
            .json()
            .await
            .map_err(|e| BookingError::Gateway(format!("unreadable status response: {e}")))?;
        Ok(parsed.data.and_then(|d| d.state).unwrap_or(parsed.code))
    }
}

impl PaymentGateway for HttpPaymentGateway {
    fn initiate_payment(&self, payload: SignedPayload) -> BoxFuture<'_, Result<String>> {
        Box::pin(self.pay(payload))
    }

    fn query_status(&self, transaction_id: &str) -> BoxFuture<'_, Result<String>> {
        Box::pin(self.status(transaction_id.to_string()))
    }
}
