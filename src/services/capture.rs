//! Screenshot backend selection.

use reqwest::Client;

use crate::error::Result;
use crate::models::{CaptureBackend, CaptureConfig};
use crate::pipeline::Capture;
use crate::services::{BrowserlessCapture, ChromeCapture};

/// Build the capture backend named by `config.backend`.
///
/// `client` is only used by the browserless backend.
pub fn capture_backend(client: Client, config: &CaptureConfig) -> Result<Box<dyn Capture>> {
    match config.backend {
        CaptureBackend::Chrome => {
            let capture = ChromeCapture::new(config.clone())?;
            log::debug!("Capturing with {}", capture.target());
            Ok(Box::new(capture))
        }
        CaptureBackend::Browserless => {
            let capture = BrowserlessCapture::new(client, config.clone())?;
            log::debug!("Capturing with the browser service at {}", capture.endpoint());
            Ok(Box::new(capture))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_browserless_backend_opens_against_service() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/json/version");
                then.status(200).json_body(json!({"Browser": "HeadlessChrome/120.0.0.0"}));
            })
            .await;

        let config = CaptureConfig {
            backend: CaptureBackend::Browserless,
            endpoint: server.base_url(),
            ..CaptureConfig::default()
        };
        let mut capture = capture_backend(Client::new(), &config).unwrap();
        capture.open().await.unwrap();
        capture.close().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chrome_backend_connects_to_ws_endpoint() {
        let config = CaptureConfig {
            ws_endpoint: Some("ws://127.0.0.1:9/devtools/browser/none".to_string()),
            ..CaptureConfig::default()
        };
        let mut capture = capture_backend(Client::new(), &config).unwrap();
        let err = capture.open().await.unwrap_err();
        assert!(
            matches!(err, AppError::Capture { ref url, .. } if url.starts_with("ws://127.0.0.1:9/"))
        );
    }

    #[test]
    fn test_invalid_ws_endpoint_rejected() {
        let config = CaptureConfig {
            ws_endpoint: Some("::".to_string()),
            ..CaptureConfig::default()
        };
        assert!(capture_backend(Client::new(), &config).is_err());
    }
}
