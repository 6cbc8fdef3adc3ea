//! rc-relay CLI
//!
//! Relays a wiki's recent changes, with a screenshot of each, to a Mastodon
//! account.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use rc_relay::{
    error::{AppError, Result},
    models::{CaptureBackend, ChangeKind, ChangeRecord, Config, MAX_ITEMS_PER_POST},
    pipeline::{ChangeFeed, Dispatch, Enricher, PageRequest, Publisher, Relay, WatermarkTracker},
    services::{
        DryRunPublisher, MastodonClient, MastodonPublisher, MediaWikiClient, capture_backend,
    },
    storage::{LocalStorage, MemoryStorage, WatermarkKey, WatermarkStore},
    utils::{format_timestamp, http, template::MessageTemplate},
};
use url::Url;

const LICENSE_NOTICE: &str = "\
rc-relay is free software: you can redistribute it and/or modify it under
the terms of the GNU Affero General Public License as published by the Free
Software Foundation, either version 3 of the License, or (at your option) any
later version.

This program is distributed in the hope that it will be useful, but WITHOUT
ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more
details.

You should have received a copy of the GNU Affero General Public License
along with this program.  If not, see <https://www.gnu.org/licenses/agpl-3.0.html>.";

/// rc-relay - MediaWiki recent changes to Mastodon
#[derive(Parser)]
#[command(
    name = "rc-relay",
    version,
    about = "Relay MediaWiki recent changes to Mastodon",
    after_help = "This program comes with ABSOLUTELY NO WARRANTY. This is free software, \
        and you are welcome to redistribute it under certain conditions. \
        Use -L/--license for details."
)]
struct Cli {
    /// Wiki directory holding api.php, e.g. https://en.wikipedia.org/w/
    #[arg(required_unless_present = "license")]
    wiki_url: Option<Url>,

    /// Mastodon instance to post to
    #[arg(required_unless_present = "license")]
    mastodon_url: Option<Url>,

    /// Mastodon app access token
    #[arg(short = 'a', long, conflicts_with = "access_token_file")]
    access_token: Option<String>,

    /// File holding the access token; surrounding whitespace is trimmed
    #[arg(short = 'A', long)]
    access_token_file: Option<PathBuf>,

    /// Status template in Mustache syntax
    #[arg(short = 'm', long, conflicts_with = "message_template_file")]
    message_template: Option<String>,

    /// File holding the status template
    #[arg(short = 'M', long)]
    message_template_file: Option<PathBuf>,

    /// Only relay changes of this type; may be repeated (default: all)
    #[arg(short = 't', long = "change-type", value_enum)]
    change_types: Vec<ChangeKind>,

    /// Stop after this many changes
    #[arg(short, long)]
    limit: Option<usize>,

    /// Changes per post, 1 to 4
    #[arg(short = 'c', long, value_parser = parse_changes_per_toot)]
    changes_per_toot: Option<usize>,

    /// Continue from the watermark saved by the previous run
    #[arg(short, long)]
    resume: bool,

    /// Capture through a running browser's DevTools WebSocket instead of
    /// launching a local one
    #[arg(long, conflicts_with = "browser_endpoint")]
    browser_ws_endpoint: Option<Url>,

    /// Capture through a browserless-compatible HTTP service at this URL
    #[arg(long)]
    browser_endpoint: Option<String>,

    /// Directory for watermark files
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Path to the TOML configuration file
    #[arg(short = 'C', long, default_value = "rc-relay.toml")]
    config: PathBuf,

    /// Log statuses instead of posting them; the watermark is not saved
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Show the license and exit
    #[arg(short = 'L', long)]
    license: bool,
}

fn parse_changes_per_toot(raw: &str) -> std::result::Result<usize, String> {
    let value: usize = raw.parse().map_err(|e| format!("{e}"))?;
    if !(1..=MAX_ITEMS_PER_POST).contains(&value) {
        return Err(format!(
            "must be between 1 and {MAX_ITEMS_PER_POST}, but got {value}"
        ));
    }
    Ok(value)
}

/// Initialize logging based on the debug flag.
fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Load the config file and apply command line overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if cli.config.exists() {
        log::info!("Loading configuration from {}", cli.config.display());
        Config::load(&cli.config)?
    } else {
        log::debug!("No config file at {}, using defaults", cli.config.display());
        Config::default()
    };

    if let Some(changes_per_toot) = cli.changes_per_toot {
        config.relay.items_per_post = changes_per_toot;
    }
    if let Some(template) = &cli.message_template {
        config.relay.message_template = template.clone();
    }
    if let Some(path) = &cli.message_template_file {
        config.relay.message_template = std::fs::read_to_string(path)?;
    }
    if let Some(ws_endpoint) = &cli.browser_ws_endpoint {
        config.capture.backend = CaptureBackend::Chrome;
        config.capture.ws_endpoint = Some(ws_endpoint.to_string());
    }
    if let Some(endpoint) = &cli.browser_endpoint {
        config.capture.backend = CaptureBackend::Browserless;
        config.capture.endpoint = endpoint.clone();
    }
    if let Some(dir) = &cli.storage_dir {
        config.storage.dir = dir.display().to_string();
    }

    config.validate()?;
    Ok(config)
}

fn access_token(cli: &Cli) -> Result<String> {
    match (&cli.access_token, &cli.access_token_file) {
        (Some(token), _) => Ok(token.trim().to_string()),
        (None, Some(path)) => Ok(std::fs::read_to_string(path)?.trim().to_string()),
        (None, None) => Err(AppError::config(
            "one of -a/--access-token or -A/--access-token-file is required",
        )),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let (Some(wiki_url), Some(mastodon_url)) = (cli.wiki_url.clone(), cli.mastodon_url.clone())
    else {
        return Err(AppError::config("<WIKI_URL> and <MASTODON_URL> are required"));
    };
    let config = load_config(&cli)?;
    let template = MessageTemplate::parse(&config.relay.message_template)?;
    let client = http::create_async_client(&config.http)?;

    let wiki = MediaWikiClient::new(client.clone(), wiki_url)?;
    let site = wiki.site_info().await?;
    log::info!("Relaying {} ({}) to {}", site.sitename, site.base, mastodon_url);

    let key = WatermarkKey::new(&Url::parse(&site.base)?, &mastodon_url);
    let local = LocalStorage::new(&config.storage.dir);
    let resume = if cli.resume {
        let watermark = WatermarkTracker::load(&local, &key).await?;
        match watermark {
            Some(watermark) => log::info!("Resuming after {}", format_timestamp(watermark)),
            None => log::info!("No saved watermark for {key}; starting from the latest changes"),
        }
        watermark
    } else {
        None
    };

    let publisher: Arc<dyn Publisher> = if cli.dry_run {
        log::info!("Dry run: statuses are logged, not posted");
        Arc::new(DryRunPublisher::new(site.clone(), template))
    } else {
        let mastodon = MastodonClient::new(client.clone(), &mastodon_url, access_token(&cli)?)?;
        mastodon.verify_credentials().await?;
        Arc::new(MastodonPublisher::new(mastodon, site.clone(), template))
    };

    let kinds = if cli.change_types.is_empty() {
        ChangeKind::ALL.to_vec()
    } else {
        cli.change_types.clone()
    };
    let request = PageRequest {
        window: Some(config.feed.window),
        namespace: config.feed.namespace,
        before: None,
        after: None,
        interval: config.feed.page_interval(),
    };
    let mut feed = ChangeFeed::new(wiki, request)
        .with_kinds(kinds)
        .with_limit(cli.limit);
    if let Some(watermark) = resume {
        feed = feed.resume_after(watermark);
    }

    let capture = capture_backend(client, &config.capture)?;
    let url_site = site.clone();
    let enricher = Enricher::new(capture, move |change: &ChangeRecord| url_site.change_url(change));
    let relay = Relay::new(feed, enricher, config.relay.items_per_post);

    let memory = MemoryStorage::new();
    let store: &dyn WatermarkStore = if cli.dry_run { &memory } else { &local };

    let mut dispatch = Dispatch::new(publisher);
    let result = relay.run(&mut dispatch, store, &key).await;

    // Let in-flight posts finish even when the run failed
    let summary = dispatch.drain().await;
    if summary.failed > 0 {
        log::warn!(
            "{} of {} posts failed",
            summary.failed,
            summary.published + summary.failed
        );
    }

    let report = result?;
    if let (true, Some(watermark)) = (cli.dry_run, report.watermark) {
        log::info!(
            "Dry run: watermark {} was not saved",
            format_timestamp(watermark)
        );
    }
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.license {
        println!("{LICENSE_NOTICE}");
        return ExitCode::SUCCESS;
    }
    init_logging(cli.debug);
    log::debug!(
        "CLI args: {:?} {:?}",
        cli.wiki_url.as_ref().map(Url::as_str),
        cli.mastodon_url.as_ref().map(Url::as_str)
    );

    match run(cli).await {
        Ok(()) => {
            log::info!("Done!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
