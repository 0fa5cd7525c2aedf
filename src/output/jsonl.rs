//! JSON Lines record sink

use crate::crawler::Record;
use crate::output::traits::{OutputResult, RecordSink};
use crate::output::CrawlReport;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use url::Url;

/// Writes one JSON object per record, one record per line
pub struct JsonLinesSink {
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    /// Opens `path` for writing
    ///
    /// With `fresh` the file is truncated, otherwise records are appended.
    pub fn create(path: &Path, fresh: bool) -> OutputResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(!fresh)
            .truncate(fresh)
            .open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl RecordSink for JsonLinesSink {
    fn write_record(&mut self, _source: &Url, record: &Record) -> OutputResult<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self, report: &CrawlReport) -> OutputResult<()> {
        self.writer.flush()?;
        tracing::debug!("Wrote {} records as JSON lines", report.records_emitted);
        Ok(())
    }
}
