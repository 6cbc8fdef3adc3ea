//! Adapters to the outside world.
//!
//! - MediaWiki API access (`MediaWikiClient`)
//! - Screenshots through a DevTools browser (`ChromeCapture`) or a remote
//!   browser service (`BrowserlessCapture`), picked by `capture_backend`
//! - Mastodon publishing (`MastodonClient`, `MastodonPublisher`)
//! - Log-only publishing for dry runs (`DryRunPublisher`)

mod browserless;
mod capture;
mod chrome;
mod dry_run;
mod mastodon;
mod mediawiki;

pub use browserless::BrowserlessCapture;
pub use capture::capture_backend;
pub use chrome::{BrowserTarget, ChromeCapture};
pub use dry_run::DryRunPublisher;
pub use mastodon::{Account, MastodonClient, MastodonPublisher, MediaAttachment, Status};
pub use mediawiki::MediaWikiClient;
