//! In-memory record sink for embedding and tests

use crate::crawler::Record;
use crate::output::traits::{OutputResult, RecordSink};
use crate::output::CrawlReport;
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

#[derive(Debug, Default)]
struct Collected {
    records: Vec<(Url, Record)>,
    report: Option<CrawlReport>,
}

/// Collects records in memory
///
/// Clones share the same storage, so a caller can keep one clone and hand
/// the other to a crawl session.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<Collected>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Collected> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records collected so far, in arrival order
    pub fn records(&self) -> Vec<Record> {
        self.lock().records.iter().map(|(_, r)| r.clone()).collect()
    }

    /// Records with the detail page each came from
    pub fn entries(&self) -> Vec<(Url, Record)> {
        self.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// The report passed to `finish`, once the crawl has ended
    pub fn final_report(&self) -> Option<CrawlReport> {
        self.lock().report.clone()
    }
}

impl RecordSink for MemorySink {
    fn write_record(&mut self, source: &Url, record: &Record) -> OutputResult<()> {
        self.lock().records.push((source.clone(), record.clone()));
        Ok(())
    }

    fn finish(&mut self, report: &CrawlReport) -> OutputResult<()> {
        self.lock().report = Some(report.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_storage() {
        let observer = MemorySink::new();
        let mut sink = observer.clone();

        let url = Url::parse("https://www.imdb.com/title/tt0903747/").unwrap();
        sink.write_record(&url, &Record::default()).unwrap();
        assert_eq!(observer.len(), 1);
        assert!(observer.final_report().is_none());

        sink.finish(&CrawlReport::default()).unwrap();
        assert!(observer.final_report().is_some());
        assert_eq!(observer.entries()[0].0, url);
    }
}
