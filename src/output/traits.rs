//! Record sink trait and output errors

use crate::crawler::Record;
use crate::output::CrawlReport;
use thiserror::Error;
use url::Url;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for extracted records
///
/// The crawl session is the only caller, so implementations need not be
/// `Sync`. Records arrive in completion order, one per detail page.
pub trait RecordSink: Send {
    /// Stores one record
    ///
    /// # Arguments
    ///
    /// * `source` - The detail page the record was extracted from
    /// * `record` - The extracted fields
    fn write_record(&mut self, source: &Url, record: &Record) -> OutputResult<()>;

    /// Flushes buffered output and closes the run
    ///
    /// Called once, after the last record.
    fn finish(&mut self, report: &CrawlReport) -> OutputResult<()>;
}
