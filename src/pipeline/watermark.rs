//! Resume watermark tracking.
//!
//! The tracker remembers the newest timestamp among the records accepted in a
//! run. At the end of the run it stores that timestamp plus one second, so a
//! resumed run, whose lower bound is inclusive on the API side, starts just
//! past the last record already relayed.

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{AppError, Result};
use crate::storage::{WatermarkKey, WatermarkStore};
use crate::utils::{format_timestamp, parse_timestamp};

/// Added to the newest accepted timestamp before it is stored.
pub const WATERMARK_OFFSET_SECS: i64 = 1;

#[derive(Debug, Clone)]
pub struct WatermarkTracker {
    latest: Option<DateTime<Utc>>,
    offset: TimeDelta,
}

impl Default for WatermarkTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl WatermarkTracker {
    pub fn new() -> Self {
        Self {
            latest: None,
            offset: TimeDelta::seconds(WATERMARK_OFFSET_SECS),
        }
    }

    /// Record the timestamp of an accepted change.
    pub fn observe(&mut self, timestamp: DateTime<Utc>) {
        self.latest = Some(match self.latest {
            Some(latest) => latest.max(timestamp),
            None => timestamp,
        });
    }

    /// Newest timestamp observed so far.
    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.latest
    }

    /// The value `commit` would store, if anything was observed.
    pub fn next_watermark(&self) -> Option<DateTime<Utc>> {
        self.latest.map(|latest| latest + self.offset)
    }

    /// Persist the watermark. Writes nothing when no record was observed, so
    /// the previous value stays in place.
    pub async fn commit(
        &self,
        store: &dyn WatermarkStore,
        key: &WatermarkKey,
    ) -> Result<Option<DateTime<Utc>>> {
        let Some(watermark) = self.next_watermark() else {
            log::debug!("No changes accepted; leaving watermark for {key} untouched");
            return Ok(None);
        };
        store.write(key, &format_timestamp(watermark)).await?;
        log::info!("Saved watermark {} for {}", format_timestamp(watermark), key);
        Ok(Some(watermark))
    }

    /// Read a previously stored watermark.
    pub async fn load(
        store: &dyn WatermarkStore,
        key: &WatermarkKey,
    ) -> Result<Option<DateTime<Utc>>> {
        match store.read(key).await? {
            Some(raw) => parse_timestamp(&raw).map(Some).map_err(|e| {
                AppError::watermark(format!("stored value {raw:?} for {key} is unreadable: {e}"))
            }),
            None => Ok(None),
        }
    }
}
