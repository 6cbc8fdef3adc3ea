//! Screenshot enrichment.
//!
//! The `Enricher` turns each change into an `EnrichedChange` by resolving a
//! URL for it and capturing that page. The capture backend holds a session
//! (a browser, a remote connection) that is opened on the first item and must
//! be released once when the stream is done, however it ends.

use async_trait::async_trait;
use url::Url;

use crate::error::Result;
use crate::models::{ChangeRecord, EnrichedChange};

/// A screenshot backend with an explicit session lifetime.
#[async_trait]
pub trait Capture: Send {
    /// Acquire the session. Called once, before the first capture.
    async fn open(&mut self) -> Result<()>;

    /// Capture `url` as PNG bytes.
    async fn capture(&mut self, url: &Url) -> Result<Vec<u8>>;

    /// Release the session.
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
impl<C: Capture + ?Sized> Capture for Box<C> {
    async fn open(&mut self) -> Result<()> {
        (**self).open().await
    }

    async fn capture(&mut self, url: &Url) -> Result<Vec<u8>> {
        (**self).capture(url).await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}

/// Maps changes to URLs and captures them, one output per input, in order.
pub struct Enricher<C, M> {
    capture: C,
    locate: M,
    open: bool,
    captured: usize,
}

impl<C, M> Enricher<C, M>
where
    C: Capture,
    M: Fn(&ChangeRecord) -> Result<Url> + Send + Sync,
{
    /// `locate` picks the page to capture for a change.
    pub fn new(capture: C, locate: M) -> Self {
        Self {
            capture,
            locate,
            open: false,
            captured: 0,
        }
    }

    /// Whether the capture session is currently held.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Number of screenshots taken so far.
    pub fn captured(&self) -> usize {
        self.captured
    }

    pub async fn enrich(&mut self, change: ChangeRecord) -> Result<EnrichedChange> {
        let url = (self.locate)(&change)?;
        if !self.open {
            log::debug!("Opening capture session");
            self.capture.open().await?;
            self.open = true;
        }

        log::debug!("Capturing... {url}");
        let image = self.capture.capture(&url).await?;
        self.captured += 1;
        log::debug!("Captured {} ({} bytes)", url, image.len());

        Ok(EnrichedChange { change, url, image })
    }

    /// Release the session if one is held. Safe to call more than once; only
    /// the first call after an `open` reaches the backend.
    pub async fn release(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        log::debug!("Closing capture session after {} captures", self.captured);
        self.capture.close().await
    }
}
