//! Markdown crawl report
//!
//! This module renders a [`CrawlReport`] as a human-readable markdown file.

use crate::output::traits::OutputResult;
use crate::output::CrawlReport;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown report to `output_path`
pub fn write_markdown_report(report: &CrawlReport, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_report(report);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl report as markdown
pub fn format_markdown_report(report: &CrawlReport) -> String {
    let mut md = String::new();

    md.push_str("# Marquee Crawl Report\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Seed**: {}\n", report.seed_url));
    md.push_str(&format!(
        "- **Duration**: {:.1} seconds ({:.2} minutes)\n",
        report.elapsed.as_secs_f64(),
        report.elapsed.as_secs_f64() / 60.0
    ));
    md.push_str(&format!(
        "- **Status**: {}\n",
        if report.stopped_early {
            "stopped early"
        } else {
            "completed"
        }
    ));
    md.push_str(&format!("- **Rate**: {:.2} pages/sec\n\n", report.rate()));

    md.push_str("## Pages\n\n");
    md.push_str("| Stage | Count |\n");
    md.push_str("|-------|-------|\n");
    md.push_str(&format!(
        "| Listing pages | {} |\n",
        report.listing_pages_fetched
    ));
    md.push_str(&format!(
        "| Detail pages | {} |\n",
        report.detail_pages_fetched
    ));
    md.push_str(&format!("| Records | {} |\n\n", report.records_emitted));

    md.push_str("## Dropped and Failed\n\n");
    md.push_str("| Reason | Count |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!(
        "| Fetch failures | {} |\n",
        report.total_fetch_failures()
    ));
    md.push_str(&format!(
        "| Extraction failures | {} |\n",
        report.extraction_failures
    ));
    md.push_str(&format!(
        "| Suspected structural drift | {} |\n",
        report.suspected_drift
    ));
    md.push_str(&format!("| Offsite links | {} |\n", report.offsite_dropped));
    md.push_str(&format!("| Robots.txt denials | {} |\n", report.robots_denied));
    md.push_str(&format!("| Sink failures | {} |\n", report.sink_failures));
    md.push_str(&format!(
        "| Abandoned tasks | {} |\n\n",
        report.abandoned_tasks
    ));

    if !report.fetch_failures.is_empty() {
        md.push_str("## Fetch Failures by Kind\n\n");
        md.push_str("| Kind | Count |\n");
        md.push_str("|------|-------|\n");
        for (kind, count) in &report.fetch_failures {
            md.push_str(&format!("| {} | {} |\n", kind, count));
        }
        md.push('\n');
    }

    if report.retries > 0 {
        md.push_str(&format!(
            "{} retries were needed for transient failures.\n\n",
            report.retries
        ));
    }

    md.push_str("---\n\n");
    md.push_str("*Generated by Marquee*\n");

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample_report() -> CrawlReport {
        let mut report = CrawlReport::new("https://www.imdb.com/search/title/?title_type=tv_series");
        report.listing_pages_fetched = 4;
        report.detail_pages_fetched = 6;
        report.records_emitted = 6;
        report.elapsed = Duration::from_secs(12);
        report
    }

    #[test]
    fn test_format_contains_counts() {
        let md = format_markdown_report(&sample_report());

        assert!(md.contains("# Marquee Crawl Report"));
        assert!(md.contains("| Listing pages | 4 |"));
        assert!(md.contains("| Records | 6 |"));
        assert!(md.contains("**Status**: completed"));
        assert!(!md.contains("Fetch Failures by Kind"));
    }

    #[test]
    fn test_format_failure_breakdown() {
        let mut report = sample_report();
        report.record_failure("http_404");
        report.stopped_early = true;

        let md = format_markdown_report(&report);
        assert!(md.contains("## Fetch Failures by Kind"));
        assert!(md.contains("| http_404 | 1 |"));
        assert!(md.contains("**Status**: stopped early"));
    }

    #[test]
    fn test_write_report_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.md");

        write_markdown_report(&sample_report(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Marquee Crawl Report"));
    }
}
