//! Screenshots through a remote headless browser.
//!
//! Talks to a browserless-compatible HTTP service: `GET /json/version` checks
//! the browser is up when the session opens, and each capture is a
//! `POST /screenshot` returning PNG bytes.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::CaptureConfig;
use crate::pipeline::Capture;
use crate::utils::base_url;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScreenshotOptions {
    full_page: bool,
    #[serde(rename = "type")]
    format: &'static str,
}

#[derive(Debug, Serialize)]
struct Viewport {
    width: u32,
    height: u32,
}

#[derive(Debug, Serialize)]
struct ScreenshotRequest<'a> {
    url: &'a str,
    options: ScreenshotOptions,
    viewport: Viewport,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "Browser", default)]
    browser: String,
}

/// `Capture` backed by a remote browser service.
#[derive(Debug, Clone)]
pub struct BrowserlessCapture {
    client: Client,
    endpoint: Url,
    config: CaptureConfig,
}

impl BrowserlessCapture {
    pub fn new(client: Client, config: CaptureConfig) -> Result<Self> {
        let endpoint = base_url(&config.endpoint)?;
        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Capture for BrowserlessCapture {
    async fn open(&mut self) -> Result<()> {
        let url = self.endpoint.join("json/version")?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AppError::capture(&url, e))?;
        if !response.status().is_success() {
            return Err(AppError::capture(
                &url,
                format!("browser is not available ({})", response.status()),
            ));
        }
        let version: VersionInfo = response.json().await?;
        log::info!("Connected to browser {} at {}", version.browser, self.endpoint);
        Ok(())
    }

    async fn capture(&mut self, url: &Url) -> Result<Vec<u8>> {
        let body = ScreenshotRequest {
            url: url.as_str(),
            options: ScreenshotOptions {
                full_page: self.config.full_page,
                format: "png",
            },
            viewport: Viewport {
                width: self.config.viewport_width,
                height: self.config.viewport_height,
            },
        };

        let response = self
            .client
            .post(self.endpoint.join("screenshot")?)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::capture(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::capture(url, format!("{status}: {detail}")));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn close(&mut self) -> Result<()> {
        // Every screenshot request is self-contained on the service side
        log::debug!("Disconnected from browser at {}", self.endpoint);
        Ok(())
    }
}
