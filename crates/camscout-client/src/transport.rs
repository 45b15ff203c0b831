use std::time::Duration;

use camscout_core::error::AppError;
use camscout_core::models::Endpoint;
use camscout_core::traits::{Transport, TransportResponse};
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// HTTP transport using reqwest.
///
/// POSTs JSON bodies with the endpoint's fixed headers. Every received
/// response is handed back with its status; only connection failures and
/// timeouts are errors here.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout_secs: u64,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(45))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let timeout_secs = timeout.as_secs();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::NetworkError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

impl Transport for ReqwestTransport {
    async fn post_json(
        &self,
        endpoint: &Endpoint,
        payload: &serde_json::Value,
    ) -> Result<TransportResponse, AppError> {
        let headers = header_map(endpoint)?;

        let response = self
            .client
            .post(&endpoint.url)
            .headers(headers)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else {
                AppError::NetworkError(format!("Failed to read response body: {e}"))
            }
        })?;

        tracing::debug!(url = %endpoint.url, status, bytes = body.len(), "POST complete");
        Ok(TransportResponse::new(status, body))
    }
}

fn header_map(endpoint: &Endpoint) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::with_capacity(endpoint.headers.len());
    for (name, value) in &endpoint.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::ConfigError(format!("Invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AppError::ConfigError(format!("Invalid value for header {name}: {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}
