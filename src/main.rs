//! Marquee main entry point
//!
//! This is the command-line interface for the Marquee series crawler.

use anyhow::{bail, Context};
use clap::Parser;
use marquee::config::{load_config_with_hash, validate, Config, FieldSelector, OutputFormat};
use marquee::crawler::CrawlSession;
use marquee::output::{load_run_summaries, print_report, print_run_summaries};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Marquee: a two-stage TV-series catalog crawler
///
/// Marquee walks paginated listing pages, follows every listed title to its
/// detail page and extracts one record per title.
#[derive(Parser, Debug)]
#[command(name = "marquee")]
#[command(version)]
#[command(about = "A two-stage TV-series catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the seed URL from the configuration
    #[arg(long, value_name = "URL")]
    seed: Option<String>,

    /// Override the output path from the configuration
    #[arg(long, value_name = "PATH")]
    output: Option<String>,

    /// Discard earlier output instead of appending to it
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// List runs stored in the SQLite output and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.seed.is_some() || cli.output.is_some() {
        if let Some(seed) = cli.seed {
            config.crawler.seed_url = seed;
        }
        if let Some(output) = cli.output {
            config.output.path = output;
        }
        validate(&config).context("invalid command-line override")?;
    }

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, &config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("marquee=info,warn"),
            1 => EnvFilter::new("marquee=debug,info"),
            2 => EnvFilter::new("marquee=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn describe(selector: &FieldSelector) -> String {
    match selector.nth {
        Some(index) => format!("{} [#{}]", selector.css, index),
        None => selector.css.clone(),
    }
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    let crawler = &config.crawler;

    println!("=== Marquee Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Seed URL: {}", crawler.seed_url);
    println!("  Allowed domains: {}", crawler.allowed_domains.join(", "));
    println!("  Max concurrent requests: {}", crawler.max_concurrent_requests);
    println!("  Download delay: {}ms", crawler.download_delay);
    println!("  Request timeout: {}s", crawler.request_timeout);
    println!(
        "  Retries: {} (delay {}ms)",
        crawler.max_retries, crawler.retry_delay
    );
    println!("  Obey robots.txt: {}", crawler.obey_robots);
    if crawler.max_records > 0 {
        println!("  Max records: {}", crawler.max_records);
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Format: {:?}", config.output.format);
    println!("  Path: {}", config.output.path);
    if let Some(report) = &config.output.report_path {
        println!("  Report: {}", report);
    }

    let listing = &config.selectors.listing;
    println!("\nListing Selectors:");
    println!("  Item header: {}", listing.item_header);
    println!("  Item link: {}", listing.item_link);
    println!("  Next page: {}", listing.next_page);

    let detail = &config.selectors.detail;
    println!("\nDetail Selectors:");
    println!("  Title: {}", describe(&detail.title));
    println!("  Global rating: {}", describe(&detail.global_rating));
    println!("  Number of voters: {}", describe(&detail.num_of_voters));
    println!("  Release date: {}", describe(&detail.release_date));
    println!("  Country: {}", describe(&detail.country));
    println!("  Awards: {}", detail.award_wins_nominations);
    println!("  Creators: {}", detail.creators);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: lists runs stored in the SQLite output
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    if config.output.format != OutputFormat::Sqlite {
        bail!("--stats needs a SQLite output (format = \"sqlite\")");
    }

    println!("Database: {}\n", config.output.path);

    let runs = load_run_summaries(Path::new(&config.output.path))
        .with_context(|| format!("failed to read {}", config.output.path))?;
    print_run_summaries(&runs);

    Ok(())
}

/// Handles the main crawl operation
///
/// The first Ctrl-C drains in-flight fetches; a second one abandons them.
async fn handle_crawl(config: Config, config_hash: &str, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (discarding earlier output)");
    }

    let session = CrawlSession::from_config(&config, config_hash, fresh)
        .context("failed to start crawl session")?;
    let handle = session.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight fetches (Ctrl-C again to abort)");
            handle.stop();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Second interrupt received, aborting");
            handle.abort();
        }
    });

    match session.run().await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
