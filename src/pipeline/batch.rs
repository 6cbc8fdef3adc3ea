//! Deduplication and batching of enriched changes.
//!
//! A page can show up several times in one run (several edits, or overlapping
//! log entries). Only the first occurrence of a title is kept. Kept items are
//! grouped, in arrival order, into batches of a fixed capacity.

use std::collections::HashSet;

use crate::models::{Batch, EnrichedChange, MAX_ITEMS_PER_POST};

/// What happened to an item handed to the batcher.
#[derive(Debug)]
pub enum Admission {
    /// Title already seen this run; the item was dropped
    Duplicate,
    /// Added to the open batch, which still has room
    Buffered,
    /// Added to the open batch, which is now full and closed
    Closed(Batch),
}

/// Per-run deduplicator and fixed-size grouper.
#[derive(Debug)]
pub struct Batcher {
    capacity: usize,
    seen: HashSet<String>,
    open: Vec<EnrichedChange>,
    closed: usize,
}

impl Batcher {
    /// Create a batcher. `capacity` is clamped to `1..=MAX_ITEMS_PER_POST`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_ITEMS_PER_POST);
        Self {
            capacity,
            seen: HashSet::new(),
            open: Vec::with_capacity(capacity),
            closed: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a title has already been accepted this run.
    pub fn has_seen(&self, title: &str) -> bool {
        self.seen.contains(title)
    }

    /// Number of batches closed so far, including by `finish`.
    pub fn batches_closed(&self) -> usize {
        self.closed
    }

    /// Offer an item.
    pub fn push(&mut self, item: EnrichedChange) -> Admission {
        if !self.seen.insert(item.title().to_string()) {
            log::debug!("Dropping duplicate [[{}]]", item.title());
            return Admission::Duplicate;
        }

        self.open.push(item);
        if self.open.len() < self.capacity {
            return Admission::Buffered;
        }

        match self.close() {
            Some(batch) => Admission::Closed(batch),
            None => Admission::Buffered,
        }
    }

    /// Close the open batch at end of stream, if it has anything in it.
    pub fn finish(&mut self) -> Option<Batch> {
        self.close()
    }

    fn close(&mut self) -> Option<Batch> {
        let items = std::mem::replace(&mut self.open, Vec::with_capacity(self.capacity));
        let batch = Batch::new(self.closed, items)?;
        self.closed += 1;
        Some(batch)
    }
}
