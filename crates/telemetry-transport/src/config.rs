//! Configuration for the delivery transport.
//!
//! Every field carries a serde default so partial configuration files (or
//! none at all) deserialize into a usable config; `validate()` enforces the
//! remaining constraints.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// SDK name reported in every outbound envelope by default
pub const DEFAULT_SDK_NAME: &str = "telemetry-transport-rust";

/// Storage key under which the queue is persisted by default
pub const DEFAULT_STORAGE_KEY: &str = "telemetry_queue";

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Ingestion endpoint URL
    pub endpoint: String,

    /// API key sent as a bearer token
    pub api_key: ApiKey,

    /// Maximum number of items per flush request
    pub batch_size: usize,

    /// Retries allowed before an item is discarded
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds
    pub retry_base_delay_ms: u64,

    /// Upper bound for backoff delays in milliseconds
    pub max_retry_delay_ms: u64,

    /// Randomize backoff delays
    pub retry_jitter: bool,

    /// Timeout for a single HTTP attempt in milliseconds
    pub request_timeout_ms: u64,

    /// Queue payloads while offline or after transient failures
    pub offline_support: bool,

    /// Maximum number of queued items
    pub max_queue_size: usize,

    /// Key used to persist the queue
    pub storage_key: String,

    /// Gzip request bodies above the threshold
    pub compression: bool,

    /// Minimum body size in bytes before compression applies
    pub compression_threshold_bytes: usize,

    /// SDK identification sent with every envelope
    pub sdk: SdkInfo,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: ApiKey::default(),
            batch_size: 50,
            max_retries: 3,
            retry_base_delay_ms: 1_000,
            max_retry_delay_ms: 60_000,
            retry_jitter: false,
            request_timeout_ms: 10_000,
            offline_support: true,
            max_queue_size: 1_000,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            compression: false,
            compression_threshold_bytes: 1_024,
            sdk: SdkInfo::default(),
        }
    }
}

impl TransportConfig {
    /// Create configuration for an endpoint with defaults for everything else
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: ApiKey::new(api_key),
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_offline_support(mut self, enabled: bool) -> Self {
        self.offline_support = enabled;
        self
    }

    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "endpoint".to_string(),
            });
        }

        let url = url::Url::parse(&self.endpoint).map_err(|e| ConfigError::Invalid {
            message: format!("endpoint '{}' is not a valid URL: {}", self.endpoint, e),
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Invalid {
                message: format!("endpoint scheme must be http or https, got '{}'", url.scheme()),
            });
        }

        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                message: "batch_size must be greater than zero".to_string(),
            });
        }

        if self.max_queue_size == 0 {
            return Err(ConfigError::Invalid {
                message: "max_queue_size must be greater than zero".to_string(),
            });
        }

        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                message: "request_timeout_ms must be greater than zero".to_string(),
            });
        }

        if self.max_retry_delay_ms < self.retry_base_delay_ms {
            return Err(ConfigError::Invalid {
                message: "max_retry_delay_ms must not be below retry_base_delay_ms".to_string(),
            });
        }

        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "storage_key".to_string(),
            });
        }

        Ok(())
    }
}

/// SDK identification block of the outbound envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkInfo {
    pub name: String,
    pub version: String,
}

impl Default for SdkInfo {
    fn default() -> Self {
        Self {
            name: DEFAULT_SDK_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// API key wrapper that keeps the secret out of debug output
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            write!(f, "ApiKey(<empty>)")
        } else {
            write!(f, "ApiKey(<REDACTED>)")
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
