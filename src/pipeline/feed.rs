// src/pipeline/feed.rs

//! Paginated change feed.
//!
//! `ChangeFeed` pulls pages from a `PageFetcher` one at a time and hands out
//! typed change records in page order. A page that comes back with a
//! continuation cursor means more pages exist; the feed waits a pacing
//! interval and asks again with that cursor. A page without one ends the feed.

use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use rand::Rng;

use crate::error::{AppError, Result};
use crate::models::{ChangeKind, ChangeRecord};

/// Default number of entries requested per page.
pub const DEFAULT_WINDOW: u32 = 10;

/// Opaque continuation token returned by the change log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of raw entries.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub entries: Vec<serde_json::Value>,

    /// Present when more pages follow
    pub cursor: Option<Cursor>,
}

/// Query parameters shared by every page of one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Maximum entries per page
    pub window: Option<u32>,

    /// Namespace filter
    pub namespace: Option<i32>,

    /// Only entries at or before this time
    pub before: Option<DateTime<Utc>>,

    /// Only entries after this time
    pub after: Option<DateTime<Utc>>,

    /// Fixed delay between pages; `None` picks a random 0.5-1s delay per page
    pub interval: Option<Duration>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            window: Some(DEFAULT_WINDOW),
            namespace: None,
            before: None,
            after: None,
            interval: None,
        }
    }
}

/// One round-trip against the change log endpoint.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest, cursor: Option<&Cursor>) -> Result<Page>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedState {
    /// No page fetched yet
    Start,
    /// Last page carried a cursor
    More,
    /// Last page had no cursor
    Exhausted,
}

/// Lazy, ordered sequence of change records spanning any number of pages.
pub struct ChangeFeed<F> {
    fetcher: F,
    request: PageRequest,
    kinds: BTreeSet<ChangeKind>,
    limit: Option<usize>,
    buffered: VecDeque<ChangeRecord>,
    cursor: Option<Cursor>,
    state: FeedState,
    yielded: usize,
    pages: usize,
}

impl<F: PageFetcher> ChangeFeed<F> {
    /// Create a feed accepting every known change kind, without a limit.
    pub fn new(fetcher: F, request: PageRequest) -> Self {
        Self {
            fetcher,
            request,
            kinds: ChangeKind::ALL.into_iter().collect(),
            limit: None,
            buffered: VecDeque::new(),
            cursor: None,
            state: FeedState::Start,
            yielded: 0,
            pages: 0,
        }
    }

    /// Only yield changes of the given kinds.
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = ChangeKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    /// Stop after `limit` records, however many pages that takes.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Resume strictly after a previously persisted watermark.
    pub fn resume_after(mut self, watermark: DateTime<Utc>) -> Self {
        self.request.after = Some(watermark);
        self
    }

    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    /// Number of records handed out so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Number of pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.yielded >= limit)
    }

    /// Whether another call to `next` may yield a record.
    pub fn has_more(&self) -> bool {
        !self.limit_reached() && (!self.buffered.is_empty() || self.state != FeedState::Exhausted)
    }

    /// Next record, fetching further pages as needed.
    ///
    /// Returns `Ok(None)` once the log is exhausted or the limit is reached.
    pub async fn next(&mut self) -> Result<Option<ChangeRecord>> {
        loop {
            if self.limit_reached() {
                return Ok(None);
            }
            if let Some(record) = self.buffered.pop_front() {
                self.yielded += 1;
                return Ok(Some(record));
            }

            match self.state {
                FeedState::Exhausted => return Ok(None),
                FeedState::Start => {}
                FeedState::More => tokio::time::sleep(self.pacing()).await,
            }

            let page = self
                .fetcher
                .fetch_page(&self.request, self.cursor.as_ref())
                .await?;
            self.pages += 1;
            log::debug!(
                "Fetched page {} with {} entries (more: {})",
                self.pages,
                page.entries.len(),
                page.cursor.is_some()
            );

            for raw in page.entries {
                if let Some(record) = self.accept(raw)? {
                    self.buffered.push_back(record);
                }
            }

            match page.cursor {
                Some(cursor) => {
                    self.cursor = Some(cursor);
                    self.state = FeedState::More;
                }
                None => {
                    self.cursor = None;
                    self.state = FeedState::Exhausted;
                }
            }
        }
    }

    /// Turn the feed into a `Stream` of records.
    pub fn into_stream(self) -> impl Stream<Item = Result<ChangeRecord>> {
        stream::try_unfold(self, |mut feed| async move {
            let next = feed.next().await?;
            Ok::<_, AppError>(next.map(|record| (record, feed)))
        })
    }

    fn accept(&self, raw: serde_json::Value) -> Result<Option<ChangeRecord>> {
        let Some(record) = ChangeRecord::from_raw(raw)? else {
            return Ok(None);
        };
        if !self.kinds.contains(&record.kind()) {
            return Ok(None);
        }
        if let Some(after) = self.request.after {
            if record.timestamp() <= after {
                log::debug!(
                    "Skipping [[{}]] at {}, not after {}",
                    record.title(),
                    record.timestamp(),
                    after
                );
                return Ok(None);
            }
        }
        Ok(Some(record))
    }

    fn pacing(&self) -> Duration {
        self.request.interval.unwrap_or_else(|| {
            Duration::from_secs_f64(rand::thread_rng().gen_range(0.5..1.0))
        })
    }
}
