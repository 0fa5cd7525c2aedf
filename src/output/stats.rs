//! Crawl report counters and their console rendering

use crate::output::sqlite::RunSummary;
use std::collections::BTreeMap;
use std::time::Duration;

/// Counts gathered by one crawl session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlReport {
    pub seed_url: String,

    /// Listing pages fetched and walked
    pub listing_pages_fetched: u64,

    /// Detail pages fetched and extracted
    pub detail_pages_fetched: u64,

    /// Records accepted by the sink
    pub records_emitted: u64,

    /// Failed fetches after retries, by failure kind
    pub fetch_failures: BTreeMap<String, u64>,

    /// Extra attempts made for transient failures
    pub retries: u64,

    /// Positional rules that could not be satisfied
    pub extraction_failures: u64,

    /// Links dropped because their host is not allowed
    pub offsite_dropped: u64,

    /// URLs skipped because robots.txt disallows them
    pub robots_denied: u64,

    /// Listing pages where the item-header selector matched nothing
    pub suspected_drift: u64,

    /// Records the sink failed to store
    pub sink_failures: u64,

    /// Tasks never completed because the crawl was stopped
    pub abandoned_tasks: u64,

    pub elapsed: Duration,

    /// True if the crawl ended on a shutdown request or the record limit
    pub stopped_early: bool,
}

impl CrawlReport {
    pub fn new(seed_url: &str) -> Self {
        Self {
            seed_url: seed_url.to_string(),
            ..Self::default()
        }
    }

    pub fn record_failure(&mut self, kind: &str) {
        *self.fetch_failures.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn total_fetch_failures(&self) -> u64 {
        self.fetch_failures.values().sum()
    }

    pub fn pages_fetched(&self) -> u64 {
        self.listing_pages_fetched + self.detail_pages_fetched
    }

    /// True when no page or record was lost along the way
    ///
    /// Drift is not counted: the terminal listing page of a normal crawl is empty.
    pub fn is_clean(&self) -> bool {
        self.total_fetch_failures() == 0
            && self.extraction_failures == 0
            && self.sink_failures == 0
            && self.abandoned_tasks == 0
    }

    /// Pages per second over the whole run
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.pages_fetched() as f64 / secs
        } else {
            0.0
        }
    }
}

/// Prints a crawl report to stdout
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");

    println!("Seed: {}", report.seed_url);
    println!(
        "Elapsed: {:.1}s ({:.2} pages/sec){}",
        report.elapsed.as_secs_f64(),
        report.rate(),
        if report.stopped_early {
            ", stopped early"
        } else {
            ""
        }
    );
    println!();

    println!("Pages:");
    println!("  Listing pages fetched: {}", report.listing_pages_fetched);
    println!("  Detail pages fetched: {}", report.detail_pages_fetched);
    println!("  Records emitted: {}", report.records_emitted);
    println!();

    println!("Problems:");
    println!("  Fetch failures: {}", report.total_fetch_failures());
    for (kind, count) in &report.fetch_failures {
        println!("    {}: {}", kind, count);
    }
    println!("  Retries: {}", report.retries);
    println!("  Extraction failures: {}", report.extraction_failures);
    println!("  Suspected structural drift: {}", report.suspected_drift);
    println!("  Offsite links dropped: {}", report.offsite_dropped);
    println!("  Robots.txt denials: {}", report.robots_denied);
    println!("  Sink failures: {}", report.sink_failures);
    println!("  Abandoned tasks: {}", report.abandoned_tasks);
}

/// Prints the runs stored in a SQLite output
pub fn print_run_summaries(runs: &[RunSummary]) {
    println!("=== Crawl Runs ===\n");

    if runs.is_empty() {
        println!("No runs recorded.");
        return;
    }

    for run in runs {
        println!(
            "Run {} [{}]: {} records",
            run.id,
            run.status.to_db_string(),
            run.record_count
        );
        println!("  Seed: {}", run.seed_url);
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!("  Config hash: {}", run.config_hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_grouped_by_kind() {
        let mut report = CrawlReport::new("https://www.imdb.com/search/title/");
        report.record_failure("http_404");
        report.record_failure("http_404");
        report.record_failure("timeout");

        assert_eq!(report.total_fetch_failures(), 3);
        assert_eq!(report.fetch_failures["http_404"], 2);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_clean_report() {
        let report = CrawlReport {
            listing_pages_fetched: 4,
            detail_pages_fetched: 6,
            records_emitted: 6,
            offsite_dropped: 3,
            suspected_drift: 1,
            ..CrawlReport::default()
        };
        assert!(report.is_clean());
        assert_eq!(report.pages_fetched(), 10);
    }

    #[test]
    fn test_rate() {
        let report = CrawlReport {
            listing_pages_fetched: 10,
            detail_pages_fetched: 10,
            elapsed: Duration::from_secs(4),
            ..CrawlReport::default()
        };
        assert!((report.rate() - 5.0).abs() < 0.01);
        assert_eq!(CrawlReport::default().rate(), 0.0);
    }
}
