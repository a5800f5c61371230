//! HTTP delivery of telemetry batches.
//!
//! [`DeliveryClient`] is the seam between the transport and the network.
//! [`HttpDeliveryClient`] posts a JSON envelope to the configured endpoint
//! and classifies the outcome into a [`TransportResponse`]; it never returns
//! an error, failures are expressed as `Error` or `Retry` responses.

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, RETRY_AFTER};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{ApiKey, SdkInfo, TransportConfig};
use crate::error::TransportError;
use crate::item::Timestamp;
use crate::response::TransportResponse;

/// Sends a batch of payloads to the remote endpoint
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Deliver `items` in a single request
    async fn deliver(&self, items: &[Value]) -> TransportResponse;
}

/// Body posted to the ingestion endpoint
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub timestamp: Timestamp,
    pub items: &'a [Value],
    pub sdk: &'a SdkInfo,
}

/// reqwest-backed delivery client
///
/// # Examples
///
/// ```no_run
/// use telemetry_transport::{DeliveryClient, HttpDeliveryClient, TransportConfig};
/// # async fn example() -> Result<(), telemetry_transport::TransportError> {
/// let config = TransportConfig::new("https://ingest.example.com/v1/events", "api-key");
/// let client = HttpDeliveryClient::new(&config)?;
///
/// let response = client.deliver(&[serde_json::json!({"event": "start"})]).await;
/// println!("delivered: {}", response.is_success());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpDeliveryClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: ApiKey,
    sdk: SdkInfo,
    timeout: Duration,
    compression: bool,
    compression_threshold: usize,
}

impl HttpDeliveryClient {
    /// Create a client for the endpoint described by `config`
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidRequest` if the HTTP client cannot be
    /// constructed.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(format!("{}/{}", config.sdk.name, config.sdk.version))
            .build()
            .map_err(|e| TransportError::InvalidRequest {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            sdk: config.sdk.clone(),
            timeout: config.request_timeout(),
            compression: config.compression,
            compression_threshold: config.compression_threshold_bytes,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Serialize the envelope, gzip-compressing it when enabled and large enough
    ///
    /// Returns the body and whether it is compressed.
    pub fn encode_body(&self, items: &[Value]) -> Result<(Vec<u8>, bool), TransportError> {
        let envelope = Envelope {
            timestamp: Timestamp::now(),
            items,
            sdk: &self.sdk,
        };

        let json = serde_json::to_vec(&envelope).map_err(|e| TransportError::Serialization {
            message: format!("Failed to serialize envelope: {}", e),
        })?;

        if !self.compression || json.len() < self.compression_threshold {
            return Ok((json, false));
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&json)
            .map_err(|e| TransportError::Serialization {
                message: format!("Failed to compress envelope: {}", e),
            })?;
        let compressed = encoder.finish().map_err(|e| TransportError::Serialization {
            message: format!("Failed to compress envelope: {}", e),
        })?;

        Ok((compressed, true))
    }

    fn classify_error(&self, error: reqwest::Error) -> TransportResponse {
        if error.is_timeout() {
            return TransportResponse::Retry {
                status: None,
                message: TransportError::Timeout {
                    timeout: self.timeout,
                }
                .to_string(),
                retry_after: None,
            };
        }

        if error.is_builder() {
            return TransportResponse::Error {
                status: None,
                message: format!("Invalid request: {}", error),
            };
        }

        TransportResponse::Retry {
            status: None,
            message: format!("HTTP request failed: {}", error),
            retry_after: None,
        }
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn deliver(&self, items: &[Value]) -> TransportResponse {
        let (body, compressed) = match self.encode_body(items) {
            Ok(encoded) => encoded,
            Err(e) => {
                return TransportResponse::Error {
                    status: None,
                    message: e.to_string(),
                }
            }
        };

        let mut request = self
            .http_client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json");

        if !self.api_key.is_empty() {
            request = request.bearer_auth(self.api_key.expose());
        }

        if compressed {
            request = request.header(CONTENT_ENCODING, "gzip");
        }

        let response = match request.body(body).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    endpoint = %self.endpoint,
                    item_count = items.len(),
                    error = %e,
                    "Telemetry request failed"
                );
                return self.classify_error(e);
            }
        };

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);

        let text = response.text().await.unwrap_or_default();
        let body = if text.trim().is_empty() {
            None
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(json) => Some(json),
                Err(_) => Some(Value::String(text)),
            }
        };

        debug!(
            endpoint = %self.endpoint,
            item_count = items.len(),
            status = status,
            compressed = compressed,
            "Telemetry request completed"
        );

        TransportResponse::from_status(status, body, retry_after)
    }
}

/// Parse a `Retry-After` value given either in seconds or as an HTTP date
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let remaining = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(remaining.to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
