//! HTTP transport used by the provider adapters.
//!
//! Adapters hold an `Arc<dyn HttpTransport>` so tests can substitute a
//! recording mock and count calls.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;

use super::ProviderError;

/// Network-level failures (no HTTP status was received).
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Status and parsed body of an HTTP response.
///
/// `body` is `Null` when the response was not JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: JsonValue,
}

impl TransportResponse {
    pub fn new(status: u16, body: JsonValue) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// POSTs a JSON body and returns the response, whatever its status.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &JsonValue,
    ) -> Result<TransportResponse, TransportError>;
}

/// Real transport using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &JsonValue,
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self.client.post(url);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request.json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::Request(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let body = serde_json::from_str(&text).unwrap_or(JsonValue::Null);

        Ok(TransportResponse { status, body })
    }
}

/// Most specific human-readable message for a failed response.
///
/// Order: `error.message`, `error` as a string, top-level `message`,
/// the canonical status reason, then a generic message.
pub fn error_message(response: &TransportResponse) -> String {
    let body = &response.body;
    body.pointer("/error/message")
        .and_then(JsonValue::as_str)
        .or_else(|| body.get("error").and_then(JsonValue::as_str))
        .or_else(|| body.get("message").and_then(JsonValue::as_str))
        .map(str::to_string)
        .or_else(|| {
            reqwest::StatusCode::from_u16(response.status)
                .ok()
                .and_then(|status| status.canonical_reason())
                .map(|reason| format!("{} {}", response.status, reason))
        })
        .unwrap_or_else(|| "Unknown error".to_string())
}

/// POST and return the body of a 2xx response; anything else becomes a
/// [`ProviderError::Transport`] naming `provider`.
pub(crate) async fn post_checked(
    transport: &dyn HttpTransport,
    provider: &str,
    url: &str,
    headers: Vec<(&str, &str)>,
    body: &JsonValue,
) -> Result<JsonValue, ProviderError> {
    let response = transport
        .post_json(url, headers, body)
        .await
        .map_err(|e| ProviderError::transport(provider, e.to_string()))?;

    if !response.is_success() {
        let message = error_message(&response);
        tracing::debug!(provider, status = response.status, %message, "Provider call failed");
        return Err(ProviderError::transport(provider, message));
    }

    Ok(response.body)
}
