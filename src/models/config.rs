//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Largest number of changes one post may carry (the media attachment limit).
pub const MAX_ITEMS_PER_POST: usize = 4;

/// Default status template: one bullet line per change.
pub const DEFAULT_MESSAGE_TEMPLATE: &str =
    "{{#changes}}\n\u{2022} {{title}} ({{deltaString}}) {{url}}\n{{/changes}}";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Recent changes query settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Batching and message settings
    #[serde(default)]
    pub relay: RelayConfig,

    /// Screenshot settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Watermark persistence
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.feed.window == 0 {
            return Err(AppError::validation("feed.window must be > 0"));
        }
        if !(1..=MAX_ITEMS_PER_POST).contains(&self.relay.items_per_post) {
            return Err(AppError::validation(format!(
                "relay.items_per_post must be between 1 and {MAX_ITEMS_PER_POST}, but got {}",
                self.relay.items_per_post
            )));
        }
        if self.capture.backend == CaptureBackend::Browserless
            && self.capture.endpoint.trim().is_empty()
        {
            return Err(AppError::validation("capture.endpoint is empty"));
        }
        Ok(())
    }
}

/// HTTP client settings shared by every adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Recent changes query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Entries per page (`rclimit`)
    #[serde(default = "defaults::window")]
    pub window: u32,

    /// Namespace filter (`rcnamespace`)
    #[serde(default = "defaults::namespace")]
    pub namespace: Option<i32>,

    /// Fixed delay between pages. Unset means a random 0.5-1s delay.
    #[serde(default)]
    pub page_interval_ms: Option<u64>,
}

impl FeedConfig {
    pub fn page_interval(&self) -> Option<Duration> {
        self.page_interval_ms.map(Duration::from_millis)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            window: defaults::window(),
            namespace: defaults::namespace(),
            page_interval_ms: None,
        }
    }
}

/// Batching and message settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Changes per post, 1 to 4
    #[serde(default = "defaults::items_per_post")]
    pub items_per_post: usize,

    /// Status template; see `utils::template`
    #[serde(default = "defaults::message_template")]
    pub message_template: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            items_per_post: defaults::items_per_post(),
            message_template: defaults::message_template(),
        }
    }
}

/// Screenshot backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureBackend {
    /// A DevTools browser, launched locally or reached through `ws_endpoint`
    #[default]
    Chrome,
    /// A browserless-compatible HTTP service at `endpoint`
    Browserless,
}

/// Headless browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub backend: CaptureBackend,

    /// DevTools WebSocket of a running browser; unset launches one
    #[serde(default)]
    pub ws_endpoint: Option<String>,

    /// Base URL of the screenshot service
    #[serde(default = "defaults::capture_endpoint")]
    pub endpoint: String,

    /// Capture the whole page rather than the viewport
    #[serde(default = "defaults::full_page")]
    pub full_page: bool,

    #[serde(default = "defaults::viewport_width")]
    pub viewport_width: u32,

    #[serde(default = "defaults::viewport_height")]
    pub viewport_height: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            backend: CaptureBackend::default(),
            ws_endpoint: None,
            endpoint: defaults::capture_endpoint(),
            full_page: defaults::full_page(),
            viewport_width: defaults::viewport_width(),
            viewport_height: defaults::viewport_height(),
        }
    }
}

/// Watermark persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding watermark files
    #[serde(default = "defaults::storage_dir")]
    pub dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: defaults::storage_dir(),
        }
    }
}

mod defaults {
    // HTTP defaults
    pub fn user_agent() -> String {
        concat!("rc-relay/", env!("CARGO_PKG_VERSION")).into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Feed defaults
    pub fn window() -> u32 {
        10
    }
    pub fn namespace() -> Option<i32> {
        Some(0)
    }

    // Relay defaults
    pub fn items_per_post() -> usize {
        super::MAX_ITEMS_PER_POST
    }
    pub fn message_template() -> String {
        super::DEFAULT_MESSAGE_TEMPLATE.into()
    }

    // Capture defaults
    pub fn capture_endpoint() -> String {
        "http://localhost:3000".into()
    }
    pub fn full_page() -> bool {
        true
    }
    pub fn viewport_width() -> u32 {
        1280
    }
    pub fn viewport_height() -> u32 {
        800
    }

    // Storage defaults
    pub fn storage_dir() -> String {
        "storage".into()
    }
}
