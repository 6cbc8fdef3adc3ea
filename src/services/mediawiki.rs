// src/services/mediawiki.rs

//! MediaWiki Action API client.
//!
//! Two queries are used: `meta=siteinfo` once at startup to learn how the
//! wiki builds its URLs, and `list=recentchanges` page by page through the
//! `PageFetcher` seam.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::SiteInfo;
use crate::pipeline::{Cursor, Page, PageFetcher, PageRequest};
use crate::utils::format_timestamp;

/// Properties requested for every recent change.
const RC_PROPS: &str = "ids|title|sizes|redirect|timestamp";

#[derive(Debug, Deserialize)]
struct ApiResponse<Q> {
    query: Option<Q>,
    #[serde(rename = "continue")]
    continuation: Option<Continuation>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Continuation {
    rccontinue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct SiteInfoQuery {
    general: SiteInfo,
}

#[derive(Debug, Deserialize)]
struct RecentChangesQuery {
    #[serde(default)]
    recentchanges: Vec<Value>,
}

/// Client for one wiki's `api.php`.
#[derive(Debug, Clone)]
pub struct MediaWikiClient {
    client: Client,
    wiki_url: Url,
    api_url: Url,
}

impl MediaWikiClient {
    /// `wiki_url` is the directory holding `api.php`, e.g.
    /// `https://en.wikipedia.org/w/`.
    pub fn new(client: Client, wiki_url: Url) -> Result<Self> {
        let api_url = wiki_url.join("./api.php")?;
        Ok(Self {
            client,
            wiki_url,
            api_url,
        })
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Fetch general site information.
    ///
    /// Anything that does not look like a MediaWiki API answer (404, no
    /// connection, a non-JSON body, no `query.general`) is reported as
    /// `AppError::NotAWiki`.
    pub async fn site_info(&self) -> Result<SiteInfo> {
        let params = [
            ("format", "json"),
            ("formatversion", "2"),
            ("action", "query"),
            ("meta", "siteinfo"),
            ("siprop", "general"),
        ];
        log::debug!("GET {} {:?}", self.api_url, params);

        let body: ApiResponse<SiteInfoQuery> = self.get(&params).await?;
        if let Some(error) = body.error {
            return Err(AppError::api(error.code, error.info));
        }
        let site = body
            .query
            .map(|q| q.general)
            .ok_or_else(|| AppError::not_a_wiki(&self.wiki_url))?;

        log::debug!("Site info: {} ({}, {})", site.sitename, site.lang, site.generator);
        Ok(site)
    }

    /// GET `api.php` and decode the JSON body.
    ///
    /// A refused connection, a 404 or a body that is not API JSON means the
    /// URL does not point at a wiki.
    async fn get<Q, P>(&self, params: &P) -> Result<ApiResponse<Q>>
    where
        Q: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let response = match self.client.get(self.api_url.clone()).query(params).send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                log::debug!("Connection to {} failed: {}", self.api_url, e);
                return Err(AppError::not_a_wiki(&self.wiki_url));
            }
            Err(e) => return Err(e.into()),
        };
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::not_a_wiki(&self.wiki_url));
        }
        response
            .error_for_status()?
            .json()
            .await
            .map_err(|e| {
                log::debug!("Unexpected response from {}: {}", self.api_url, e);
                AppError::not_a_wiki(&self.wiki_url)
            })
    }

    fn change_params(request: &PageRequest, cursor: Option<&Cursor>) -> Vec<(&'static str, String)> {
        let mut params: Vec<(&'static str, String)> = vec![
            ("format", "json".into()),
            ("formatversion", "2".into()),
            ("action", "query".into()),
            ("list", "recentchanges".into()),
            ("rcprop", RC_PROPS.into()),
        ];
        if let Some(before) = request.before {
            params.push(("rcstart", format_timestamp(before)));
        }
        if let Some(after) = request.after {
            params.push(("rcend", format_timestamp(after)));
        }
        if let Some(window) = request.window {
            params.push(("rclimit", window.to_string()));
        }
        if let Some(namespace) = request.namespace {
            params.push(("rcnamespace", namespace.to_string()));
        }
        if let Some(cursor) = cursor {
            params.push(("rccontinue", cursor.as_str().to_string()));
        }
        params
    }
}

#[async_trait]
impl PageFetcher for MediaWikiClient {
    async fn fetch_page(&self, request: &PageRequest, cursor: Option<&Cursor>) -> Result<Page> {
        let params = Self::change_params(request, cursor);
        log::debug!("GET {} {:?}", self.api_url, params);

        let body: ApiResponse<RecentChangesQuery> = self.get(&params).await?;
        if let Some(error) = body.error {
            return Err(AppError::api(error.code, error.info));
        }

        let entries = body.query.map(|q| q.recentchanges).unwrap_or_default();
        let cursor = body
            .continuation
            .and_then(|c| c.rccontinue)
            .map(Cursor::new);
        Ok(Page { entries, cursor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{raw_change, ts};
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> MediaWikiClient {
        let wiki_url = Url::parse(&server.url("/w/")).unwrap();
        MediaWikiClient::new(Client::new(), wiki_url).unwrap()
    }

    #[test]
    fn test_api_url_relative_to_wiki_url() {
        let client = MediaWikiClient::new(
            Client::new(),
            Url::parse("https://en.wikipedia.org/w/").unwrap(),
        )
        .unwrap();
        assert_eq!(client.api_url().as_str(), "https://en.wikipedia.org/w/api.php");
    }

    #[tokio::test]
    async fn test_site_info() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/w/api.php")
                    .query_param("meta", "siteinfo")
                    .query_param("siprop", "general");
                then.status(200).json_body(json!({
                    "batchcomplete": true,
                    "query": {"general": {
                        "mainpage": "Main Page",
                        "base": "https://wiki.example.org/wiki/Main_Page",
                        "sitename": "Example Wiki",
                        "generator": "MediaWiki 1.39.0",
                        "lang": "en",
                        "articlepath": "/wiki/$1",
                        "scriptpath": "/w",
                        "script": "/w/index.php",
                        "server": "https://wiki.example.org",
                        "wikiid": "examplewiki",
                        "maxarticlesize": 2097152
                    }}
                }));
            })
            .await;

        let site = client(&server).site_info().await.unwrap();
        mock.assert_async().await;
        assert_eq!(site.sitename, "Example Wiki");
        assert_eq!(site.lang, "en");
        assert_eq!(site.script, "/w/index.php");
    }

    #[tokio::test]
    async fn test_site_info_not_found_is_not_a_wiki() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/w/api.php");
                then.status(404).body("Not Found");
            })
            .await;

        let err = client(&server).site_info().await.unwrap_err();
        assert!(err.is_not_a_wiki());
    }

    #[tokio::test]
    async fn test_site_info_html_is_not_a_wiki() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/w/api.php");
                then.status(200)
                    .header("content-type", "text/html")
                    .body("<html><body>Hello</body></html>");
            })
            .await;

        let err = client(&server).site_info().await.unwrap_err();
        assert!(err.is_not_a_wiki());
    }

    #[tokio::test]
    async fn test_site_info_unreachable_is_not_a_wiki() {
        // Nothing listens on port 9 of localhost in test environments
        let client = MediaWikiClient::new(
            Client::new(),
            Url::parse("http://127.0.0.1:9/w/").unwrap(),
        )
        .unwrap();
        let err = client.site_info().await.unwrap_err();
        assert!(err.is_not_a_wiki());
    }

    #[tokio::test]
    async fn test_fetch_page_sends_bounds_and_reads_cursor() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/w/api.php")
                    .query_param("action", "query")
                    .query_param("list", "recentchanges")
                    .query_param("formatversion", "2")
                    .query_param("rcprop", RC_PROPS)
                    .query_param("rcstart", "2022-05-02T00:00:00Z")
                    .query_param("rcend", "2022-05-01T10:10:01Z")
                    .query_param("rclimit", "10")
                    .query_param("rcnamespace", "0");
                then.status(200).json_body(json!({
                    "batchcomplete": true,
                    "continue": {"rccontinue": "20220501101500|123", "continue": "-||"},
                    "query": {"recentchanges": [
                        raw_change("edit", "Rust", "2022-05-01T10:15:00Z"),
                        raw_change("categorize", "Category:X", "2022-05-01T10:14:00Z")
                    ]}
                }));
            })
            .await;

        let request = PageRequest {
            window: Some(10),
            namespace: Some(0),
            before: Some(ts("2022-05-02T00:00:00Z")),
            after: Some(ts("2022-05-01T10:10:01Z")),
            interval: None,
        };
        let page = client(&server).fetch_page(&request, None).await.unwrap();
        mock.assert_async().await;

        // Filtering unknown kinds is the feed's job, entries come back raw
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.cursor, Some(Cursor::new("20220501101500|123")));
    }

    #[tokio::test]
    async fn test_fetch_page_passes_cursor_and_detects_last_page() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/w/api.php")
                    .query_param("rccontinue", "20220501101500|123");
                then.status(200).json_body(json!({
                    "batchcomplete": true,
                    "query": {"recentchanges": []}
                }));
            })
            .await;

        let cursor = Cursor::new("20220501101500|123");
        let page = client(&server)
            .fetch_page(&PageRequest::default(), Some(&cursor))
            .await
            .unwrap();
        mock.assert_async().await;
        assert!(page.entries.is_empty());
        assert!(page.cursor.is_none());
    }

    #[tokio::test]
    async fn test_fetch_page_api_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/w/api.php");
                then.status(200).json_body(json!({
                    "error": {"code": "badvalue", "info": "Unrecognized value for parameter \"rcnamespace\"."}
                }));
            })
            .await;

        let err = client(&server)
            .fetch_page(&PageRequest::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Api { ref code, .. } if code == "badvalue"));
    }

    #[tokio::test]
    async fn test_fetch_page_unreachable_is_not_a_wiki() {
        let client = MediaWikiClient::new(
            Client::new(),
            Url::parse("http://127.0.0.1:9/w/").unwrap(),
        )
        .unwrap();
        let err = client
            .fetch_page(&PageRequest::default(), None)
            .await
            .unwrap_err();
        assert!(err.is_not_a_wiki());
    }

    #[tokio::test]
    async fn test_fetch_page_html_is_not_a_wiki() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/w/api.php")
                    .query_param("list", "recentchanges");
                then.status(200)
                    .header("content-type", "text/html")
                    .body("<!DOCTYPE html><html><body>Parked domain</body></html>");
            })
            .await;

        let err = client(&server)
            .fetch_page(&PageRequest::default(), None)
            .await
            .unwrap_err();
        assert!(err.is_not_a_wiki());
    }

    #[tokio::test]
    async fn test_fetch_page_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/w/api.php");
                then.status(404);
            })
            .await;

        let err = client(&server)
            .fetch_page(&PageRequest::default(), None)
            .await
            .unwrap_err();
        assert!(err.is_not_a_wiki());
    }
}
