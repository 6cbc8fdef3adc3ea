//! Fire-and-forget publishing of closed batches.
//!
//! `Dispatch::send` hands a batch to a background task and returns at once,
//! so the relay keeps pulling and capturing while earlier posts are still in
//! flight. Publish results are only collected by `drain`; a failed post is
//! logged and counted but never stops the run.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;

use crate::error::Result;
use crate::models::Batch;

/// Identifies a published post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub id: String,

    /// Public URL of the post, if the destination reports one
    pub url: Option<String>,
}

/// A destination that turns a batch into one post.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, batch: Batch) -> Result<PublishReceipt>;
}

/// Outcome of draining a `Dispatch`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub published: usize,
    pub failed: usize,
}

/// Background publish tasks for one run.
pub struct Dispatch {
    publisher: Arc<dyn Publisher>,
    tasks: JoinSet<(usize, Result<PublishReceipt>)>,
    dispatched: usize,
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("dispatched", &self.dispatched)
            .field("in_flight", &self.tasks.len())
            .finish()
    }
}

impl Dispatch {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            publisher,
            tasks: JoinSet::new(),
            dispatched: 0,
        }
    }

    /// Start publishing a batch without waiting for it.
    pub fn send(&mut self, batch: Batch) {
        let publisher = Arc::clone(&self.publisher);
        let sequence = batch.sequence();
        log::info!(
            "Dispatching batch #{} ({} changes): {:?}",
            sequence,
            batch.len(),
            batch.titles()
        );
        self.tasks
            .spawn(async move { (sequence, publisher.publish(batch).await) });
        self.dispatched += 1;
    }

    /// Number of batches handed off so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Wait for every outstanding publish and tally the results.
    pub async fn drain(mut self) -> PublishSummary {
        let mut summary = PublishSummary::default();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((sequence, Ok(receipt))) => {
                    summary.published += 1;
                    match receipt.url {
                        Some(url) => log::info!("Published batch #{sequence}: {url}"),
                        None => log::info!("Published batch #{sequence} as {}", receipt.id),
                    }
                }
                Ok((sequence, Err(e))) => {
                    summary.failed += 1;
                    log::warn!("Failed to publish batch #{sequence}: {e}");
                }
                Err(e) => {
                    summary.failed += 1;
                    log::warn!("Publish task did not complete: {e}");
                }
            }
        }
        summary
    }
}
