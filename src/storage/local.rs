//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! └── watermarks/
//!     └── {sha256(key)}.json
//! ```
//!
//! Writes go to a temporary file first and are renamed into place, so an
//! interrupted run never leaves a half-written watermark behind.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{WatermarkKey, WatermarkStore};

/// On-disk record. The key is kept alongside the value for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredWatermark {
    site: String,
    destination: String,
    value: String,
    updated_at: DateTime<Utc>,
}

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    fn watermark_key(key: &WatermarkKey) -> String {
        format!("watermarks/{}.json", key.digest())
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl WatermarkStore for LocalStorage {
    async fn read(&self, key: &WatermarkKey) -> Result<Option<String>> {
        let stored: Option<StoredWatermark> = self.read_json(&Self::watermark_key(key)).await?;
        match stored {
            Some(stored) => {
                log::debug!(
                    "Loaded watermark {} for {} (written {})",
                    stored.value,
                    key,
                    stored.updated_at
                );
                Ok(Some(stored.value))
            }
            None => {
                log::debug!("No watermark stored for {key}");
                Ok(None)
            }
        }
    }

    async fn write(&self, key: &WatermarkKey, value: &str) -> Result<()> {
        let stored = StoredWatermark {
            site: key.site().to_string(),
            destination: key.destination().to_string(),
            value: value.to_string(),
            updated_at: Utc::now(),
        };
        self.write_json(&Self::watermark_key(key), &stored).await
    }
}
