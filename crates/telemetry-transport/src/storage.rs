//! # Storage Interface
//!
//! Key-value persistence used to keep the delivery queue across restarts.
//!
//! Values are opaque strings; the transport stores its queue as a JSON
//! document under a single key. Implementations must be safe to share
//! between tasks.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StorageError;

/// Asynchronous string key-value store
///
/// # Examples
///
/// ```
/// use telemetry_transport::storage::{InMemoryStorage, Storage};
/// # async fn example() -> Result<(), telemetry_transport::StorageError> {
/// let storage = InMemoryStorage::new();
/// storage.set_item("queue", "[]").await?;
/// assert_eq!(storage.get_item("queue").await?, Some("[]".to_string()));
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the value stored under `key`, `None` if absent
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`; removing an absent key is not an error
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every key
    async fn clear(&self) -> Result<(), StorageError>;
}

/// Process-local storage, useful for tests and hosts without a disk
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> StorageError {
        StorageError::Unavailable {
            message: "in-memory storage lock poisoned".to_string(),
        }
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.read().map_err(|_| Self::poisoned())?;
        Ok(items.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|_| Self::poisoned())?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|_| Self::poisoned())?;
        items.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|_| Self::poisoned())?;
        items.clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
