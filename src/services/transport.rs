//! Outbound HTTP transport: "send JSON, get the raw body or a classified failure".

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::types::errors::TransportError;

/// Maximum number of response-body characters kept in an `HttpStatus` error.
const ERROR_BODY_LIMIT: usize = 512;

/// The single primitive the gateway needs from the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POSTs `body` as JSON to `url` and returns the raw response body on a
    /// 2xx status. No retries or redirects policy is applied here.
    async fn post(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: &Value,
        timeout: Duration,
    ) -> Result<String, TransportError>;
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vocab-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

fn truncate(body: String) -> String {
    if body.chars().count() <= ERROR_BODY_LIMIT {
        body
    } else {
        body.chars().take(ERROR_BODY_LIMIT).collect()
    }
}

fn classify(e: reqwest::Error, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(timeout.as_millis() as u64)
    } else if e.is_builder() {
        TransportError::InvalidRequest(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: &Value,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        // Content-Type comes from the materialized headers, so the body is sent pre-encoded.
        let mut request = self.client.post(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request = request.body(body.to_string());

        let response = request.send().await.map_err(|e| classify(e, timeout))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| classify(e, timeout))?;

        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                body: truncate(text),
            });
        }

        Ok(text)
    }
}
