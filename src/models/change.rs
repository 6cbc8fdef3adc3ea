//! Recent change records.
//!
//! A change log entry is one of six kinds, and which revision and size
//! fields it carries depends entirely on the kind. `ChangeRecord` encodes
//! that as a tagged union keyed by the API's `type` field, so a `log` entry
//! has no revision id to read and an `edit` always has both sizes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, Result};

/// The closed set of change kinds the relay understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Log,
    New,
    Edit,
    Upload,
    Move,
    Delete,
}

impl ChangeKind {
    /// Every kind, in the order the API documents them.
    pub const ALL: [ChangeKind; 6] = [
        ChangeKind::Log,
        ChangeKind::New,
        ChangeKind::Edit,
        ChangeKind::Upload,
        ChangeKind::Move,
        ChangeKind::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Log => "log",
            ChangeKind::New => "new",
            ChangeKind::Edit => "edit",
            ChangeKind::Upload => "upload",
            ChangeKind::Move => "move",
            ChangeKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        ChangeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("unknown change type '{s}'")))
    }
}

/// Identity of the page a change applies to. Shared by every kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Change log entry id (`rcid`), unique within one wiki only
    #[serde(rename = "rcid")]
    pub id: u64,

    #[serde(rename = "ns")]
    pub namespace_id: i32,

    #[serde(rename = "pageid")]
    pub page_id: u64,

    /// Page title, also the per-run deduplication key
    pub title: String,

    pub timestamp: DateTime<Utc>,

    /// Set when the page is a redirect
    #[serde(
        default,
        deserialize_with = "present_flag",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub redirect: bool,
}

/// Payload of `log` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(flatten)]
    pub subject: Subject,
}

/// Payload of `new` and `upload` entries: a first revision, no prior size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creation {
    #[serde(flatten)]
    pub subject: Subject,

    #[serde(rename = "revid")]
    pub revision_id: u64,

    #[serde(rename = "newlen")]
    pub new_size: u64,
}

/// Payload of `edit`, `move` and `delete` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    #[serde(flatten)]
    pub subject: Subject,

    #[serde(rename = "revid")]
    pub revision_id: u64,

    #[serde(rename = "old_revid")]
    pub previous_revision_id: u64,

    #[serde(rename = "newlen")]
    pub new_size: u64,

    #[serde(rename = "oldlen")]
    pub old_size: u64,
}

/// One entry from the wiki's recent changes log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChangeRecord {
    Log(LogEntry),
    New(Creation),
    Edit(Revision),
    Upload(Creation),
    Move(Revision),
    Delete(Revision),
}

impl ChangeRecord {
    /// Decode one raw API entry.
    ///
    /// Returns `Ok(None)` for entries whose `type` is outside the closed set,
    /// so newer API kinds are skipped instead of failing the run. Entries of a
    /// known kind with missing fields are still an error.
    pub fn from_raw(raw: serde_json::Value) -> Result<Option<Self>> {
        let known = raw
            .get("type")
            .and_then(|t| t.as_str())
            .is_some_and(|t| t.parse::<ChangeKind>().is_ok());
        if !known {
            log::debug!("Skipping change of unrecognized type: {raw}");
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(raw)?))
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeRecord::Log(_) => ChangeKind::Log,
            ChangeRecord::New(_) => ChangeKind::New,
            ChangeRecord::Edit(_) => ChangeKind::Edit,
            ChangeRecord::Upload(_) => ChangeKind::Upload,
            ChangeRecord::Move(_) => ChangeKind::Move,
            ChangeRecord::Delete(_) => ChangeKind::Delete,
        }
    }

    pub fn subject(&self) -> &Subject {
        match self {
            ChangeRecord::Log(entry) => &entry.subject,
            ChangeRecord::New(c) | ChangeRecord::Upload(c) => &c.subject,
            ChangeRecord::Edit(r) | ChangeRecord::Move(r) | ChangeRecord::Delete(r) => &r.subject,
        }
    }

    pub fn title(&self) -> &str {
        &self.subject().title
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.subject().timestamp
    }

    /// Revision produced by this change. `None` for `log` entries.
    pub fn revision_id(&self) -> Option<u64> {
        match self {
            ChangeRecord::Log(_) => None,
            ChangeRecord::New(c) | ChangeRecord::Upload(c) => Some(c.revision_id),
            ChangeRecord::Edit(r) | ChangeRecord::Move(r) | ChangeRecord::Delete(r) => {
                Some(r.revision_id)
            }
        }
    }

    pub fn previous_revision_id(&self) -> Option<u64> {
        match self {
            ChangeRecord::Edit(r) | ChangeRecord::Move(r) | ChangeRecord::Delete(r) => {
                Some(r.previous_revision_id)
            }
            _ => None,
        }
    }

    pub fn new_size(&self) -> Option<u64> {
        match self {
            ChangeRecord::Log(_) => None,
            ChangeRecord::New(c) | ChangeRecord::Upload(c) => Some(c.new_size),
            ChangeRecord::Edit(r) | ChangeRecord::Move(r) | ChangeRecord::Delete(r) => {
                Some(r.new_size)
            }
        }
    }

    pub fn old_size(&self) -> Option<u64> {
        match self {
            ChangeRecord::Edit(r) | ChangeRecord::Move(r) | ChangeRecord::Delete(r) => {
                Some(r.old_size)
            }
            _ => None,
        }
    }

    /// Signed size change in bytes. Zero for `log`, the full size for
    /// creations.
    pub fn size_delta(&self) -> i64 {
        let new = self.new_size().unwrap_or(0) as i64;
        let old = self.old_size().unwrap_or(0) as i64;
        new - old
    }
}

/// Treats any present value as `true`, so both `"redirect": ""` (format
/// version 1) and `"redirect": true` (format version 2) decode.
fn present_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(!matches!(value, serde_json::Value::Bool(false) | serde_json::Value::Null))
}
