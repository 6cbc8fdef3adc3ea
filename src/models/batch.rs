//! Enriched changes and the batches they are published in.

use url::Url;

use super::ChangeRecord;

/// A change paired with the screenshot taken of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedChange {
    pub change: ChangeRecord,

    /// The page that was captured
    pub url: Url,

    /// PNG bytes, opaque to the pipeline
    pub image: Vec<u8>,
}

impl EnrichedChange {
    pub fn title(&self) -> &str {
        self.change.title()
    }
}

/// A non-empty, ordered group of changes published as one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    sequence: usize,
    items: Vec<EnrichedChange>,
}

impl Batch {
    /// Build a batch. Returns `None` when `items` is empty.
    pub fn new(sequence: usize, items: Vec<EnrichedChange>) -> Option<Self> {
        if items.is_empty() {
            None
        } else {
            Some(Self { sequence, items })
        }
    }

    /// Position of this batch in the run, starting at 0.
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    pub fn items(&self) -> &[EnrichedChange] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn titles(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.title()).collect()
    }

    pub fn into_items(self) -> Vec<EnrichedChange> {
        self.items
    }
}
