//! Storage abstractions for watermark persistence.
//!
//! One opaque string is kept per (wiki, destination) pair:
//!
//! ```text
//! storage/
//! └── watermarks/
//!     ├── 3f1c...e9.json   # sha256 of the key, holds the value and the key
//!     └── 9a0d...41.json
//! ```

pub mod local;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::Result;

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Identifies whose watermark this is: which wiki, relayed where.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatermarkKey {
    site: String,
    destination: String,
}

impl WatermarkKey {
    pub fn new(site: &Url, destination: &Url) -> Self {
        Self {
            site: site.to_string(),
            destination: destination.to_string(),
        }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Stable hex digest, safe to use as a file name.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.site.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.destination.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for WatermarkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.site, self.destination)
    }
}

/// Trait for watermark storage backends.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Read the stored value, `None` if nothing was ever written.
    async fn read(&self, key: &WatermarkKey) -> Result<Option<String>>;

    /// Replace the stored value.
    async fn write(&self, key: &WatermarkKey, value: &str) -> Result<()>;
}
