// src/error.rs

//! Unified error handling for the relay.

use std::fmt;

use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// The target URL does not answer like a MediaWiki site
    #[error("{url} does not seem to be a MediaWiki site")]
    NotAWiki { url: String },

    /// The wiki answered with an API error object
    #[error("API error {code}: {info}")]
    Api { code: String, info: String },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Timestamp parsing failed
    #[error("Timestamp parse error: {0}")]
    Timestamp(#[from] chrono::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Screenshot capture failed
    #[error("Capture error for {url}: {message}")]
    Capture { url: String, message: String },

    /// Publishing a batch failed
    #[error("Publish error: {0}")]
    Publish(String),

    /// Stored watermark could not be read back
    #[error("Watermark error: {0}")]
    Watermark(String),
}

impl AppError {
    /// Create a "not a recognized site" error.
    pub fn not_a_wiki(url: impl fmt::Display) -> Self {
        Self::NotAWiki {
            url: url.to_string(),
        }
    }

    /// Create an API error from the wiki's error code and message.
    pub fn api(code: impl Into<String>, info: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            info: info.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a capture error with the URL being captured.
    pub fn capture(url: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::Capture {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a publish error.
    pub fn publish(message: impl fmt::Display) -> Self {
        Self::Publish(message.to_string())
    }

    /// Create a watermark error.
    pub fn watermark(message: impl Into<String>) -> Self {
        Self::Watermark(message.into())
    }

    /// Whether this error means the operator pointed us at the wrong site.
    pub fn is_not_a_wiki(&self) -> bool {
        matches!(self, Self::NotAWiki { .. })
    }
}
