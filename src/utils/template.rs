//! Status message templates.
//!
//! Templates are Mustache (see `utils::mustache`), never HTML-escaped. The
//! view has two keys:
//!
//! - `changes`: one entry per change in the batch with `title`,
//!   `deltaBytes`, `deltaString`, `url`, `type`, `rcid`, `ns`, `pageid`,
//!   `revid`, `old_revid`, `newlen`, `oldlen`, `timestamp` and `redirect`.
//! - `site`: the wiki's general site information (`site.sitename`,
//!   `site.lang`, `site.base`, `site.server`, `site.wikiid`, ...).
//!
//! Unknown names render as the empty string.

use serde::Serialize;
use serde_json::json;

use crate::error::Result;
use crate::models::{Batch, EnrichedChange, SiteInfo};
use crate::utils::bytes::format_delta;
use crate::utils::format_timestamp;
use crate::utils::mustache::{self, Template};

/// Template values for one change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeContext {
    pub title: String,
    #[serde(rename = "deltaBytes")]
    pub delta_bytes: i64,
    #[serde(rename = "deltaString")]
    pub delta_string: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub rcid: u64,
    pub ns: i32,
    pub pageid: u64,
    pub revid: Option<u64>,
    pub old_revid: Option<u64>,
    pub newlen: Option<u64>,
    pub oldlen: Option<u64>,
    pub timestamp: String,
    pub redirect: bool,
}

impl ChangeContext {
    pub fn new(item: &EnrichedChange) -> Self {
        let change = &item.change;
        let subject = change.subject();
        let delta_bytes = change.size_delta();
        Self {
            title: subject.title.clone(),
            delta_bytes,
            delta_string: format_delta(delta_bytes),
            url: item.url.to_string(),
            kind: change.kind().to_string(),
            rcid: subject.id,
            ns: subject.namespace_id,
            pageid: subject.page_id,
            revid: change.revision_id(),
            old_revid: change.previous_revision_id(),
            newlen: change.new_size(),
            oldlen: change.old_size(),
            timestamp: format_timestamp(subject.timestamp),
            redirect: subject.redirect,
        }
    }
}

/// A compiled status template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    template: Template,
}

impl MessageTemplate {
    /// Compile a template; malformed tags are a validation error.
    pub fn parse(source: &str) -> Result<Self> {
        Ok(Self {
            template: mustache::compile(source)?,
        })
    }

    /// Render a status for a batch.
    pub fn render(&self, site: &SiteInfo, changes: &[ChangeContext]) -> String {
        self.template.render(&json!({
            "site": site,
            "changes": changes,
        }))
    }

    /// Render the status for every change in a batch.
    pub fn render_batch(&self, site: &SiteInfo, batch: &Batch) -> String {
        let changes: Vec<ChangeContext> = batch.items().iter().map(ChangeContext::new).collect();
        self.render(site, &changes)
    }
}
