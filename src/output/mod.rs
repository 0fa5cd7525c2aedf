//! Output module for records and crawl reports
//!
//! This module handles:
//! - Record sinks (JSON Lines, SQLite, in-memory)
//! - The crawl report and its console and markdown renderings
//! - Listing earlier runs stored in a SQLite output

mod jsonl;
mod markdown;
mod memory;
mod schema;
mod sqlite;
pub mod stats;
mod traits;

pub use jsonl::JsonLinesSink;
pub use markdown::{format_markdown_report, write_markdown_report};
pub use memory::MemorySink;
pub use sqlite::{load_run_summaries, RunStatus, RunSummary, SqliteSink};
pub use stats::{print_report, print_run_summaries, CrawlReport};
pub use traits::{OutputError, OutputResult, RecordSink};

use crate::config::{OutputConfig, OutputFormat};
use std::path::Path;

/// Opens the sink selected by the output configuration
///
/// # Arguments
///
/// * `config` - Output format and path
/// * `seed_url` - Recorded with the run (SQLite only)
/// * `config_hash` - Recorded with the run (SQLite only)
/// * `fresh` - Discard earlier output instead of appending to it
pub fn open_sink(
    config: &OutputConfig,
    seed_url: &str,
    config_hash: &str,
    fresh: bool,
) -> OutputResult<Box<dyn RecordSink>> {
    let path = Path::new(&config.path);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let sink: Box<dyn RecordSink> = match config.format {
        OutputFormat::Jsonl => Box::new(JsonLinesSink::create(path, fresh)?),
        OutputFormat::Sqlite => Box::new(SqliteSink::open(path, seed_url, config_hash, fresh)?),
    };

    Ok(sink)
}
