// src/services/mastodon.rs

//! Mastodon publishing.
//!
//! Each batch becomes one public status: every screenshot is uploaded as a
//! media attachment (concurrently), then the rendered message is posted with
//! those attachments in batch order.

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Batch, EnrichedChange, SiteInfo};
use crate::pipeline::{PublishReceipt, Publisher};
use crate::utils::base_url;
use crate::utils::template::MessageTemplate;

/// Focal point keeping the top of a full-page screenshot in thumbnails.
const MEDIA_FOCUS: &str = "0.0,-1.0";

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub acct: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaAttachment {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Status {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewStatus<'a> {
    status: &'a str,
    visibility: &'a str,
    media_ids: Vec<String>,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Thin client for the parts of the Mastodon REST API the relay needs.
#[derive(Debug, Clone)]
pub struct MastodonClient {
    client: Client,
    instance: Url,
    token: String,
}

impl MastodonClient {
    pub fn new(client: Client, instance: &Url, token: impl Into<String>) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(AppError::config("Mastodon access token is empty"));
        }
        Ok(Self {
            client,
            instance: base_url(instance.as_str())?,
            token,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.instance.join(path)?)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        Err(AppError::publish(format!("{status}: {detail}")))
    }

    /// Check the token and return the account it belongs to.
    pub async fn verify_credentials(&self) -> Result<Account> {
        let url = self.endpoint("api/v1/accounts/verify_credentials")?;
        let account: Account = self.send(self.client.get(url)).await?.json().await?;
        log::info!("Logged in to {} as @{}", self.instance, account.acct);
        Ok(account)
    }

    /// Upload one PNG image.
    pub async fn upload_media(
        &self,
        image: Vec<u8>,
        file_name: String,
        description: &str,
    ) -> Result<MediaAttachment> {
        let url = self.endpoint("api/v1/media")?;
        let file = Part::bytes(image).file_name(file_name).mime_str("image/png")?;
        let form = Form::new()
            .part("file", file)
            .text("description", description.to_string())
            .text("focus", MEDIA_FOCUS);

        let attachment: MediaAttachment = self
            .send(self.client.post(url).multipart(form))
            .await?
            .json()
            .await?;
        log::debug!("Uploaded an image attachment: {}", attachment.id);
        Ok(attachment)
    }

    /// Post a public status with the given attachments.
    pub async fn post_status(
        &self,
        status: &str,
        media_ids: Vec<String>,
        language: &str,
    ) -> Result<Status> {
        let url = self.endpoint("api/v1/statuses")?;
        let body = NewStatus {
            status,
            visibility: "public",
            media_ids,
            language,
        };
        let posted: Status = self
            .send(self.client.post(url).json(&body))
            .await?
            .json()
            .await?;
        log::debug!("Posted a status: {}", posted.id);
        Ok(posted)
    }
}

/// `Publisher` that posts each batch to Mastodon.
#[derive(Debug, Clone)]
pub struct MastodonPublisher {
    client: MastodonClient,
    site: SiteInfo,
    template: MessageTemplate,
}

impl MastodonPublisher {
    pub fn new(client: MastodonClient, site: SiteInfo, template: MessageTemplate) -> Self {
        Self {
            client,
            site,
            template,
        }
    }

    fn file_name(item: &EnrichedChange) -> String {
        let subject = item.change.subject();
        format!("{}-{}.png", subject.page_id, subject.id)
    }
}

#[async_trait]
impl Publisher for MastodonPublisher {
    async fn publish(&self, batch: Batch) -> Result<PublishReceipt> {
        let status = self.template.render_batch(&self.site, &batch);

        let uploads = batch.into_items().into_iter().map(|item| {
            let file_name = Self::file_name(&item);
            let description = item.title().to_string();
            async move {
                self.client
                    .upload_media(item.image, file_name, &description)
                    .await
            }
        });
        let media = try_join_all(uploads).await?;
        let media_ids = media.into_iter().map(|m| m.id).collect();

        let posted = self
            .client
            .post_status(&status, media_ids, &self.site.lang)
            .await?;
        Ok(PublishReceipt {
            id: posted.id,
            url: posted.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_MESSAGE_TEMPLATE;
    use crate::test_utils::{enriched, sample_site};
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> MastodonClient {
        let instance = Url::parse(&server.base_url()).unwrap();
        MastodonClient::new(Client::new(), &instance, " secret-token\n").unwrap()
    }

    #[test]
    fn test_empty_token_rejected() {
        let instance = Url::parse("https://mastodon.example").unwrap();
        assert!(MastodonClient::new(Client::new(), &instance, "  \n").is_err());
    }

    #[tokio::test]
    async fn test_verify_credentials_sends_trimmed_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/accounts/verify_credentials")
                    .header("authorization", "Bearer secret-token");
                then.status(200).json_body(json!({
                    "id": "1", "username": "rcbot", "acct": "rcbot",
                    "url": "https://mastodon.example/@rcbot"
                }));
            })
            .await;

        let account = client(&server).verify_credentials().await.unwrap();
        mock.assert_async().await;
        assert_eq!(account.username, "rcbot");
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/accounts/verify_credentials");
                then.status(401)
                    .json_body(json!({"error": "The access token is invalid"}));
            })
            .await;

        let err = client(&server).verify_credentials().await.unwrap_err();
        assert!(err.to_string().contains("The access token is invalid"));
    }

    #[tokio::test]
    async fn test_upload_media_form() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/media")
                    .body_contains("filename=\"42-7.png\"")
                    .body_contains("image/png")
                    .body_contains("Ferris")
                    .body_contains(MEDIA_FOCUS);
                then.status(200).json_body(json!({"id": "m1", "type": "image"}));
            })
            .await;

        let attachment = client(&server)
            .upload_media(b"png".to_vec(), "42-7.png".to_string(), "Ferris")
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(attachment.id, "m1");
    }

    #[tokio::test]
    async fn test_publish_uploads_then_posts() {
        let server = MockServer::start_async().await;
        let media = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/media");
                then.status(200).json_body(json!({"id": "m1", "type": "image"}));
            })
            .await;
        let status = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/statuses")
                    .json_body_partial(
                        r#"{"visibility": "public", "language": "en", "media_ids": ["m1", "m1"]}"#,
                    )
                    .body_contains("Rust (+300 B)");
                then.status(200).json_body(json!({
                    "id": "s1", "url": "https://mastodon.example/@rcbot/s1"
                }));
            })
            .await;

        let publisher = MastodonPublisher::new(
            client(&server),
            sample_site(),
            MessageTemplate::parse(DEFAULT_MESSAGE_TEMPLATE).unwrap(),
        );
        let batch = Batch::new(
            0,
            vec![
                enriched("edit", "Rust", "2022-05-01T10:00:00Z"),
                enriched("new", "Ferris", "2022-05-01T10:01:00Z"),
            ],
        )
        .unwrap();

        let receipt = publisher.publish(batch).await.unwrap();
        media.assert_hits_async(2).await;
        status.assert_async().await;
        assert_eq!(receipt.id, "s1");
        assert_eq!(receipt.url.as_deref(), Some("https://mastodon.example/@rcbot/s1"));
    }

    #[tokio::test]
    async fn test_publish_fails_when_upload_fails() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/media");
                then.status(422)
                    .json_body(json!({"error": "Validation failed: File is invalid"}));
            })
            .await;
        let status = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/statuses");
                then.status(200).json_body(json!({"id": "s1"}));
            })
            .await;

        let publisher = MastodonPublisher::new(
            client(&server),
            sample_site(),
            MessageTemplate::parse(DEFAULT_MESSAGE_TEMPLATE).unwrap(),
        );
        let batch = Batch::new(0, vec![enriched("edit", "Rust", "2022-05-01T10:00:00Z")]).unwrap();

        assert!(publisher.publish(batch).await.is_err());
        status.assert_hits_async(0).await;
    }
}
