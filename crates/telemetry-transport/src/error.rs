//! Error types for transport, storage and configuration operations.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the delivery transport
///
/// Variants carry owned strings so that outcomes holding an error can be
/// cloned and handed back to callers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("Transport has been destroyed")]
    Destroyed,

    #[error("Network is offline and offline support is disabled")]
    Offline,

    #[error("Delivery rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Delivery failed with retryable status {status}: {message}")]
    ServerUnavailable { status: u16, message: String },

    #[error("Request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Item exceeded {max_retries} retries: {message}")]
    RetriesExhausted { max_retries: u32, message: String },

    #[error("Queue is full ({capacity} items)")]
    QueueFull { capacity: usize },

    #[error("Serialization failed: {message}")]
    Serialization { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl TransportError {
    /// Check if error is transient and the delivery may succeed later
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Destroyed => false,
            Self::Offline => true,
            Self::Rejected { .. } => false,
            Self::ServerUnavailable { .. } => true,
            Self::Timeout { .. } => true,
            Self::ConnectionFailed { .. } => true,
            Self::InvalidRequest { .. } => false,
            Self::RetriesExhausted { .. } => false,
            Self::QueueFull { .. } => true,
            Self::Serialization { .. } => false,
            Self::Storage(e) => e.is_transient(),
            Self::Config(_) => false,
        }
    }

    /// Check if error should be retried
    pub fn should_retry(&self) -> bool {
        self.is_transient()
    }
}

/// Errors raised by [`Storage`](crate::storage::Storage) implementations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("Invalid storage key '{key}': {message}")]
    InvalidKey { key: String, message: String },

    #[error("Storage I/O failed: {message}")]
    Io { message: String },

    #[error("Stored value is corrupt: {message}")]
    Corrupt { message: String },

    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },
}

impl StorageError {
    /// Check if error is transient
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Unavailable { .. })
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
