//! Shared fixtures and in-process stand-ins for the network adapters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::time::Instant;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Batch, ChangeRecord, EnrichedChange, SiteInfo};
use crate::pipeline::{Capture, Cursor, Page, PageFetcher, PageRequest, PublishReceipt, Publisher};
use crate::storage::WatermarkKey;
use crate::utils::parse_timestamp;

pub fn sample_site() -> SiteInfo {
    SiteInfo {
        base: "https://wiki.example.org/wiki/Main_Page".to_string(),
        sitename: "Example Wiki".to_string(),
        lang: "en".to_string(),
        articlepath: "/wiki/$1".to_string(),
        script: "/w/index.php".to_string(),
        mainpage: "Main Page".to_string(),
        server: "https://wiki.example.org".to_string(),
        servername: "wiki.example.org".to_string(),
        scriptpath: "/w".to_string(),
        wikiid: "examplewiki".to_string(),
        generator: "MediaWiki 1.39.0".to_string(),
        logo: String::new(),
        timezone: "UTC".to_string(),
    }
}

pub fn ts(raw: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap()
}

pub fn key() -> WatermarkKey {
    WatermarkKey::new(
        &Url::parse("https://wiki.example.org/wiki/Main_Page").unwrap(),
        &Url::parse("https://mastodon.example/").unwrap(),
    )
}

/// An API entry as `list=recentchanges` returns it. Sizes go 1200 -> 1500.
pub fn raw_change(kind: &str, title: &str, timestamp: &str) -> Value {
    json!({
        "type": kind,
        "ns": 0,
        "title": title,
        "pageid": 42,
        "revid": 1002,
        "old_revid": 1001,
        "rcid": 7,
        "oldlen": 1200,
        "newlen": 1500,
        "timestamp": timestamp
    })
}

pub fn change(kind: &str, title: &str, timestamp: &str) -> ChangeRecord {
    ChangeRecord::from_raw(raw_change(kind, title, timestamp))
        .unwrap()
        .unwrap()
}

/// A change with its `sample_site` URL; the URL bytes stand in for the image.
pub fn enriched(kind: &str, title: &str, timestamp: &str) -> EnrichedChange {
    let change = change(kind, title, timestamp);
    let url = sample_site().change_url(&change).unwrap();
    let image = url.as_str().as_bytes().to_vec();
    EnrichedChange { change, url, image }
}

/// Serves canned pages in order. Every page but the last carries a cursor.
pub struct StubFetcher {
    pages: Vec<Vec<Value>>,
    fail: bool,
    calls: Arc<Mutex<Vec<Option<String>>>>,
    requests: Arc<Mutex<Vec<PageRequest>>>,
    fetched_at: Arc<Mutex<Vec<Instant>>>,
}

impl StubFetcher {
    pub fn new(pages: Vec<Vec<Value>>) -> Self {
        Self {
            pages,
            fail: false,
            calls: Arc::default(),
            requests: Arc::default(),
            fetched_at: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    /// Cursor passed on each call, in call order.
    pub fn calls(&self) -> Arc<Mutex<Vec<Option<String>>>> {
        Arc::clone(&self.calls)
    }

    pub fn requests(&self) -> Arc<Mutex<Vec<PageRequest>>> {
        Arc::clone(&self.requests)
    }

    /// Tokio clock reading at each call.
    pub fn fetched_at(&self) -> Arc<Mutex<Vec<Instant>>> {
        Arc::clone(&self.fetched_at)
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch_page(&self, request: &PageRequest, cursor: Option<&Cursor>) -> Result<Page> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(cursor.map(|c| c.as_str().to_string()));
            calls.len() - 1
        };
        self.requests.lock().unwrap().push(request.clone());
        self.fetched_at.lock().unwrap().push(Instant::now());

        if self.fail {
            return Err(AppError::not_a_wiki("https://stub.invalid/"));
        }

        let entries = self.pages.get(index).cloned().unwrap_or_default();
        let cursor = (index + 1 < self.pages.len()).then(|| Cursor::new(format!("cursor-{}", index + 1)));
        Ok(Page { entries, cursor })
    }
}

#[derive(Debug, Default)]
pub struct CaptureCounters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    captured: AtomicUsize,
}

impl CaptureCounters {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn captured(&self) -> usize {
        self.captured.load(Ordering::SeqCst)
    }
}

/// Returns the URL bytes as the image. Can be told to fail after `n` captures.
#[derive(Debug, Default)]
pub struct StubCapture {
    fail_after: Option<usize>,
    counters: Arc<CaptureCounters>,
}

impl StubCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(successes: usize) -> Self {
        Self {
            fail_after: Some(successes),
            ..Self::default()
        }
    }

    pub fn counters(&self) -> Arc<CaptureCounters> {
        Arc::clone(&self.counters)
    }
}

#[async_trait]
impl Capture for StubCapture {
    async fn open(&mut self) -> Result<()> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn capture(&mut self, url: &Url) -> Result<Vec<u8>> {
        if self
            .fail_after
            .is_some_and(|n| self.counters.captured() >= n)
        {
            return Err(AppError::capture(url, "stub capture failure"));
        }
        self.counters.captured.fetch_add(1, Ordering::SeqCst);
        Ok(url.as_str().as_bytes().to_vec())
    }

    async fn close(&mut self) -> Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Keeps every batch it is asked to publish.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    batches: Arc<Mutex<Vec<Batch>>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Published batches in sequence order.
    pub fn batches(&self) -> Vec<Batch> {
        let mut batches = self.batches.lock().unwrap().clone();
        batches.sort_by_key(Batch::sequence);
        batches
    }

    pub fn titles(&self) -> Vec<Vec<String>> {
        self.batches()
            .iter()
            .map(|b| b.titles().into_iter().map(str::to_string).collect())
            .collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, batch: Batch) -> Result<PublishReceipt> {
        if self.fail {
            return Err(AppError::publish("stub publish failure"));
        }
        let id = format!("status-{}", batch.sequence());
        self.batches.lock().unwrap().push(batch);
        Ok(PublishReceipt { id, url: None })
    }
}
