//! Utility functions and helpers.

pub mod bytes;
pub mod http;
pub mod mustache;
pub mod template;

use chrono::{DateTime, SecondsFormat, Utc};
use url::Url;

use crate::error::Result;

/// Parse a base URL, making sure relative joins append to its path instead of
/// replacing the last segment.
pub fn base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Format a timestamp the way the MediaWiki API writes them
/// (`2022-05-01T10:00:00Z`).
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw.trim())?.with_timezone(&Utc))
}
