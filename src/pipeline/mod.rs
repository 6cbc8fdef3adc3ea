//! The relay pipeline.
//!
//! - `feed`: paginated change log reader
//! - `enrich`: per-change screenshot capture
//! - `batch`: per-run dedup and fixed-size grouping
//! - `dispatch`: background publishing of closed batches
//! - `watermark`: resume point tracking
//! - `relay`: wires the stages together for one run

pub mod batch;
pub mod dispatch;
pub mod enrich;
pub mod feed;
pub mod relay;
pub mod watermark;

pub use batch::{Admission, Batcher};
pub use dispatch::{Dispatch, PublishReceipt, PublishSummary, Publisher};
pub use enrich::{Capture, Enricher};
pub use feed::{ChangeFeed, Cursor, Page, PageFetcher, PageRequest};
pub use relay::{Relay, RelayReport};
pub use watermark::WatermarkTracker;
