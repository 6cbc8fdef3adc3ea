//! Publisher that only logs what would have been posted.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Batch, SiteInfo};
use crate::pipeline::{PublishReceipt, Publisher};
use crate::utils::template::MessageTemplate;

#[derive(Debug, Clone)]
pub struct DryRunPublisher {
    site: SiteInfo,
    template: MessageTemplate,
}

impl DryRunPublisher {
    pub fn new(site: SiteInfo, template: MessageTemplate) -> Self {
        Self { site, template }
    }
}

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn publish(&self, batch: Batch) -> Result<PublishReceipt> {
        let status = self.template.render_batch(&self.site, &batch);
        for item in batch.items() {
            log::info!(
                "[dry run] attach {} ({} bytes)",
                item.url,
                item.image.len()
            );
        }
        log::info!(
            "[dry run] status #{} ({}):\n{}",
            batch.sequence(),
            self.site.lang,
            status
        );
        Ok(PublishReceipt {
            id: format!("dry-run-{}", batch.sequence()),
            url: None,
        })
    }
}
