//! Screenshots through a Chrome DevTools Protocol browser.
//!
//! A session is one browser and one page. The browser is a local headless
//! Chromium launched for the run, or an already running one reached through
//! its DevTools WebSocket. Every capture navigates the same page, and closing
//! the session closes the page and then the browser.

use std::fmt;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::CaptureConfig;
use crate::pipeline::Capture;

/// Where the session's browser comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserTarget {
    /// Launch a local headless browser
    Launch,
    /// Connect to a running browser
    Connect(Url),
}

impl BrowserTarget {
    pub fn from_config(config: &CaptureConfig) -> Result<Self> {
        match config.ws_endpoint.as_deref().map(str::trim) {
            None | Some("") => Ok(Self::Launch),
            Some(raw) => Ok(Self::Connect(Url::parse(raw)?)),
        }
    }
}

impl fmt::Display for BrowserTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launch => f.write_str("local browser"),
            Self::Connect(url) => write!(f, "{url}"),
        }
    }
}

struct Session {
    browser: Browser,
    page: Page,
    events: JoinHandle<()>,
}

/// `Capture` backed by a DevTools browser.
pub struct ChromeCapture {
    target: BrowserTarget,
    config: CaptureConfig,
    session: Option<Session>,
}

impl fmt::Debug for ChromeCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChromeCapture")
            .field("target", &self.target)
            .field("open", &self.is_open())
            .finish()
    }
}

impl ChromeCapture {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        Ok(Self {
            target: BrowserTarget::from_config(&config)?,
            config,
            session: None,
        })
    }

    pub fn target(&self) -> &BrowserTarget {
        &self.target
    }

    /// Whether a browser and page are held.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }
}

#[async_trait]
impl Capture for ChromeCapture {
    async fn open(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        let started = match &self.target {
            BrowserTarget::Launch => {
                let config = BrowserConfig::builder()
                    .window_size(self.config.viewport_width, self.config.viewport_height)
                    .viewport(None)
                    .build()
                    .map_err(|e| AppError::capture(&self.target, e))?;
                Browser::launch(config).await
            }
            BrowserTarget::Connect(url) => Browser::connect(url.as_str()).await,
        };
        let (browser, mut handler) = started.map_err(|e| AppError::capture(&self.target, e))?;

        // The handler drives the DevTools connection and must be polled
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("Browser connection closed: {e}");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                events.abort();
                return Err(AppError::capture(&self.target, e));
            }
        };

        log::info!("Opened a browser page ({})", self.target);
        self.session = Some(Session {
            browser,
            page,
            events,
        });
        Ok(())
    }

    async fn capture(&mut self, url: &Url) -> Result<Vec<u8>> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| AppError::capture(url, "browser session is not open"))?;

        session
            .page
            .goto(url.as_str())
            .await
            .map_err(|e| AppError::capture(url, e))?;
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(self.config.full_page)
            .build();
        session
            .page
            .screenshot(params)
            .await
            .map_err(|e| AppError::capture(url, e))
    }

    async fn close(&mut self) -> Result<()> {
        let Some(Session {
            mut browser,
            page,
            events,
        }) = self.session.take()
        else {
            return Ok(());
        };

        log::debug!("Closing page...");
        let page_closed = page.close().await;
        log::debug!("Closing browser...");
        let browser_closed = browser.close().await;
        if let Err(e) = browser.wait().await {
            log::warn!("Browser process did not exit cleanly: {e}");
        }
        events.abort();

        page_closed.map_err(|e| AppError::capture(&self.target, e))?;
        browser_closed.map_err(|e| AppError::capture(&self.target, e))?;
        Ok(())
    }
}
