//! Crawler module for the two-stage listing/detail crawl
//!
//! This module contains the core crawling logic, including:
//! - The frontier walker for paginated listing pages
//! - The detail extractor producing one [`Record`] per title page
//! - HTTP fetching with retry logic
//! - The crawl session owning the task queue and worker pool

mod detail;
mod fetcher;
mod listing;
mod session;
mod task;

pub use crate::output::CrawlReport;
pub use detail::{DetailRules, ExtractError, Extraction, Record};
pub use fetcher::{
    build_http_client, fetch_url, fetch_with_retry, FetchFailure, FetchOutcome,
    HttpTransport, Page, RetryPolicy, Transport,
};
pub use listing::{ListingPage, ListingRules};
pub use session::{CrawlSession, ShutdownHandle, ShutdownSignal};
pub use task::{FetchTask, Stage};

use crate::config::Config;
use crate::{ConfigError, MarqueeError};
use scraper::Selector;

/// Compiles a configured CSS selector, naming the field on failure
pub(crate) fn compile_selector(field: &str, css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css.trim()).map_err(|_| ConfigError::InvalidSelector {
        field: field.to_string(),
        css: css.to_string(),
    })
}

/// Runs a complete crawl with the HTTP transport and the configured sink
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the output sink
/// 2. Build the HTTP transport
/// 3. Walk listing pages and extract every linked detail page
/// 4. Finish the sink and return the crawl report
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file, recorded with the run
/// * `fresh` - Discard earlier output instead of appending to it
///
/// # Example
///
/// ```no_run
/// use marquee::config::load_config_with_hash;
/// use marquee::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("marquee.toml"))?;
/// let report = run_crawl(config, &hash, false).await?;
/// println!("{} records", report.records_emitted);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    config_hash: &str,
    fresh: bool,
) -> Result<CrawlReport, MarqueeError> {
    let session = CrawlSession::from_config(&config, config_hash, fresh)?;
    session.run().await
}
