//! Wiki site metadata and URL resolution.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;
use crate::models::ChangeRecord;

/// General site information (`meta=siteinfo&siprop=general`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteInfo {
    /// Absolute URL of the main page
    pub base: String,

    pub sitename: String,

    /// Content language code, used as the post language
    pub lang: String,

    /// Path template for articles, `$1` stands for the title
    pub articlepath: String,

    /// Path of `index.php`
    pub script: String,

    #[serde(default)]
    pub mainpage: String,

    #[serde(default)]
    pub server: String,

    #[serde(default)]
    pub servername: String,

    #[serde(default)]
    pub scriptpath: String,

    #[serde(default)]
    pub wikiid: String,

    #[serde(default)]
    pub generator: String,

    #[serde(default)]
    pub logo: String,

    #[serde(default)]
    pub timezone: String,
}

impl SiteInfo {
    fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.base)?)
    }

    /// URL of the current version of an article.
    pub fn article_url(&self, title: &str) -> Result<Url> {
        let path = self.articlepath.replace("$1", &encode_title(title));
        Ok(self.base_url()?.join(&path)?)
    }

    /// URL of a specific revision.
    pub fn revision_url(&self, revision_id: u64) -> Result<Url> {
        let path = format!("{}?oldid={}", self.script, revision_id);
        Ok(self.base_url()?.join(&path)?)
    }

    /// Representative URL for a change: the article for `log` entries,
    /// the revision otherwise.
    pub fn change_url(&self, change: &ChangeRecord) -> Result<Url> {
        match change.revision_id() {
            Some(revision_id) => self.revision_url(revision_id),
            None => self.article_url(change.title()),
        }
    }
}

/// Title in the form MediaWiki uses in paths.
fn encode_title(title: &str) -> String {
    title
        .replace('%', "%25")
        .replace('?', "%3F")
        .replace('#', "%23")
        .replace(' ', "_")
}
