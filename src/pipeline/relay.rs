//! One relay run: feed -> enrich -> dedup/batch -> dispatch, then watermark.
//!
//! The capture session is released on every exit path. The watermark is
//! written only when the feed ends normally, which includes stopping at the
//! caller's record limit. After an error nothing is written and the next run
//! starts again from the previous watermark.

use chrono::{DateTime, Utc};
use url::Url;

use super::batch::{Admission, Batcher};
use super::dispatch::Dispatch;
use super::enrich::{Capture, Enricher};
use super::feed::{ChangeFeed, PageFetcher};
use super::watermark::WatermarkTracker;
use crate::error::Result;
use crate::models::ChangeRecord;
use crate::storage::{WatermarkKey, WatermarkStore};

/// Counters for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Changes that survived dedup and were captured
    pub accepted: usize,

    /// Changes dropped because their title was already seen
    pub duplicates: usize,

    /// Batches handed to the dispatcher
    pub batches: usize,

    /// Watermark written at the end of the run, if any
    pub watermark: Option<DateTime<Utc>>,
}

pub struct Relay<F, C, M> {
    feed: ChangeFeed<F>,
    enricher: Enricher<C, M>,
    batcher: Batcher,
    tracker: WatermarkTracker,
}

impl<F, C, M> Relay<F, C, M>
where
    F: PageFetcher,
    C: Capture,
    M: Fn(&ChangeRecord) -> Result<Url> + Send + Sync,
{
    pub fn new(feed: ChangeFeed<F>, enricher: Enricher<C, M>, items_per_post: usize) -> Self {
        Self {
            feed,
            enricher,
            batcher: Batcher::new(items_per_post),
            tracker: WatermarkTracker::new(),
        }
    }

    /// Drive the feed to the end, sending each closed batch to `dispatch`.
    ///
    /// Batches already sent stay in `dispatch` even when this returns an
    /// error, so the caller can still drain them.
    pub async fn run(
        mut self,
        dispatch: &mut Dispatch,
        store: &dyn WatermarkStore,
        key: &WatermarkKey,
    ) -> Result<RelayReport> {
        let mut report = RelayReport::default();
        let pumped = self.pump(dispatch, &mut report).await;

        if let Err(e) = self.enricher.release().await {
            log::warn!("Failed to release capture session: {e}");
        }
        pumped?;

        if let Some(batch) = self.batcher.finish() {
            dispatch.send(batch);
        }
        report.batches = self.batcher.batches_closed();
        report.watermark = self.tracker.commit(store, key).await?;

        log::info!(
            "Relayed {} changes in {} batches ({} duplicates, {} pages)",
            report.accepted,
            report.batches,
            report.duplicates,
            self.feed.pages_fetched()
        );
        Ok(report)
    }

    async fn pump(&mut self, dispatch: &mut Dispatch, report: &mut RelayReport) -> Result<()> {
        while let Some(change) = self.feed.next().await? {
            // Skip the screenshot for titles the batcher would drop anyway
            if self.batcher.has_seen(change.title()) {
                log::debug!("Already relayed [[{}]] this run", change.title());
                report.duplicates += 1;
                continue;
            }

            let item = self.enricher.enrich(change).await?;
            let timestamp = item.change.timestamp();
            log::info!("[[{}]] {}", item.title(), item.url);

            match self.batcher.push(item) {
                Admission::Duplicate => {
                    report.duplicates += 1;
                    continue;
                }
                Admission::Buffered => {}
                Admission::Closed(batch) => dispatch.send(batch),
            }
            self.tracker.observe(timestamp);
            report.accepted += 1;
        }
        Ok(())
    }
}
