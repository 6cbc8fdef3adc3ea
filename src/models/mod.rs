// src/models/mod.rs

//! Domain models for the relay.
//!
//! Change records as the wiki reports them, the enriched form they take
//! once captured, site metadata, and the application configuration.

mod batch;
mod change;
mod config;
mod site;

// Re-export all public types
pub use batch::{Batch, EnrichedChange};
pub use change::{ChangeKind, ChangeRecord, Creation, LogEntry, Revision, Subject};
pub use config::{
    CaptureBackend, CaptureConfig, Config, DEFAULT_MESSAGE_TEMPLATE, FeedConfig, HttpConfig, MAX_ITEMS_PER_POST,
    RelayConfig, StorageConfig,
};
pub use site::SiteInfo;
