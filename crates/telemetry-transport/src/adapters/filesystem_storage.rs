//! # Filesystem Storage Adapter
//!
//! Local filesystem implementation of the [`Storage`] trait. Each key is a
//! file inside the base directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::StorageError;
use crate::storage::Storage;

const VALUE_EXTENSION: &str = "dat";

/// Filesystem-based key-value storage
///
/// Writes go to a temporary file which is then renamed over the target, so
/// a crash mid-write never leaves a truncated value behind.
///
/// # Examples
///
/// ```no_run
/// use telemetry_transport::adapters::FilesystemStorage;
/// use std::path::PathBuf;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = FilesystemStorage::new(PathBuf::from("./.telemetry")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    base_path: PathBuf,
}

impl FilesystemStorage {
    /// Create new filesystem storage rooted at `base_path`
    ///
    /// # Errors
    ///
    /// Returns error if the base directory cannot be created.
    pub async fn new(base_path: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path)
            .await
            .map_err(|e| StorageError::Io {
                message: format!("Failed to create base directory: {}", e),
            })?;

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map a key to its file, rejecting keys that could escape the directory
    fn value_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.len() > 200 {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                message: "must be 1-200 characters".to_string(),
            });
        }

        if key.starts_with('.')
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                message: "only ASCII alphanumeric, '-', '_' and non-leading '.' allowed"
                    .to_string(),
            });
        }

        Ok(self
            .base_path
            .join(format!("{}.{}", key, VALUE_EXTENSION)))
    }
}

#[async_trait]
impl Storage for FilesystemStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.value_path(key)?;

        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io {
                message: format!("Failed to read '{}': {}", path.display(), e),
            }),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.value_path(key)?;
        let temp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| StorageError::Io {
                message: format!("Failed to create temp file: {}", e),
            })?;

        file.write_all(value.as_bytes())
            .await
            .map_err(|e| StorageError::Io {
                message: format!("Failed to write value: {}", e),
            })?;

        file.flush().await.map_err(|e| StorageError::Io {
            message: format!("Failed to flush file: {}", e),
        })?;
        drop(file);

        // Rename to final path (atomic on most filesystems)
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| StorageError::Io {
                message: format!("Failed to rename temp file: {}", e),
            })?;

        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let path = self.value_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io {
                message: format!("Failed to remove '{}': {}", path.display(), e),
            }),
        }
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut entries = fs::read_dir(&self.base_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_value = path
                .extension()
                .map(|ext| ext == VALUE_EXTENSION)
                .unwrap_or(false);

            if is_value {
                fs::remove_file(&path).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "filesystem_storage_tests.rs"]
mod tests;
