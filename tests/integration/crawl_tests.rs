//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end over real HTTP.

use marquee::config::{
    Config, CrawlerConfig, OutputConfig, OutputFormat, SelectorConfig, UserAgentConfig,
};
use marquee::crawler::{CrawlSession, HttpTransport};
use marquee::output::{load_run_summaries, MemorySink, RunStatus};
use marquee::url::DomainPolicy;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration seeded at `seed_url`
fn create_test_config(seed_url: &str, format: OutputFormat, output_path: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            seed_url: seed_url.to_string(),
            allowed_domains: vec!["127.0.0.1".to_string()],
            max_concurrent_requests: 4,
            download_delay: 0,
            request_timeout: 10,
            max_retries: 0,
            retry_delay: 0,
            obey_robots: false,
            max_records: 0,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            format,
            path: output_path.to_string(),
            report_path: None,
        },
        selectors: SelectorConfig::default(),
    }
}

fn http_transport(config: &Config) -> HttpTransport {
    HttpTransport::new(
        &config.user_agent,
        Duration::from_secs(10),
        DomainPolicy::new(config.crawler.allowed_domains.clone()),
    )
    .unwrap()
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

fn listing_page(items: &[String], next: Option<&str>) -> String {
    let mut body = String::from("<html><body><div class=\"lister-list\">");
    for href in items {
        body.push_str(&format!(
            r#"<div class="lister-item mode-advanced"><h3 class="lister-item-header"><span class="lister-item-index">1.</span><a href="{}">Series</a></h3></div>"#,
            href
        ));
    }
    body.push_str("</div>");
    if let Some(next) = next {
        body.push_str(&format!(
            r#"<div class="desc"><a href="{}" class="lister-page-next next-page">Next »</a></div>"#,
            next
        ));
    }
    body.push_str("</body></html>");
    body
}

fn detail_page(title: &str, creator: &str) -> String {
    format!(
        r#"<html><body>
        <div class="sc-80d4314-1 fbQftq"><h1>{}</h1></div>
        <div class="sc-7ab21ed2-0 fAePGh">
            <div class="sc-7ab21ed2-2 kYEdvH"><span class="sc-7ab21ed2-1 jGRxWM">8.7</span></div>
            <div class="sc-7ab21ed2-3 dPVcnq">250K</div>
        </div>
        <ul class="sc-36c36dd0-9 fEgKYH"><li><a class="ipc-metadata-list-item__list-content-item ipc-metadata-list-item__list-content-item--link" href="/name/nm1/">{}</a></li></ul>
        </body></html>"#,
        title, creator
    )
}

/// Mounts listing pages `/search/1` to `/search/{pages}` with two titles each,
/// plus a terminal listing page with no items and no next link
async fn mount_paginated_site(server: &MockServer, pages: u32) {
    for page in 1..=pages {
        let items = vec![format!("/title/{}a/", page), format!("/title/{}b/", page)];
        let next = format!("/search/{}", page + 1);

        Mock::given(method("GET"))
            .and(path(format!("/search/{}", page)))
            .respond_with(html(listing_page(&items, Some(&next))))
            .expect(1)
            .mount(server)
            .await;

        for suffix in ["a", "b"] {
            Mock::given(method("GET"))
                .and(path(format!("/title/{}{}/", page, suffix)))
                .respond_with(html(detail_page(
                    &format!("Series {}{}", page, suffix),
                    "Jane Doe",
                )))
                .expect(1)
                .mount(server)
                .await;
        }
    }

    Mock::given(method("GET"))
        .and(path(format!("/search/{}", pages + 1)))
        .respond_with(html(listing_page(&[], None)))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_to_jsonl() {
    let mock_server = MockServer::start().await;
    mount_paginated_site(&mock_server, 3).await;

    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("series.jsonl");
    let config = create_test_config(
        &format!("{}/search/1", mock_server.uri()),
        OutputFormat::Jsonl,
        output.to_str().unwrap(),
    );

    let session = CrawlSession::from_config(&config, "testhash", true).unwrap();
    let report = session.run().await.unwrap();

    assert_eq!(report.listing_pages_fetched, 4);
    assert_eq!(report.detail_pages_fetched, 6);
    assert_eq!(report.records_emitted, 6);
    assert_eq!(report.total_fetch_failures(), 0);
    assert_eq!(report.suspected_drift, 1);

    let content = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 6);

    for line in &lines {
        assert_eq!(line["global_rating"], "8.7");
        assert_eq!(line["num_of_voters"], "250K");
        assert_eq!(line["creators"], serde_json::json!(["Jane Doe"]));
        assert!(line["release_date"].is_null());
    }

    let mut titles: Vec<&str> = lines.iter().map(|l| l["title"].as_str().unwrap()).collect();
    titles.sort();
    assert_eq!(
        titles,
        vec!["Series 1a", "Series 1b", "Series 2a", "Series 2b", "Series 3a", "Series 3b"]
    );

    // Mock expectations (exactly one fetch per page) are verified on drop
}

#[tokio::test]
async fn test_offsite_links_never_dispatched() {
    let site = MockServer::start().await;
    let offsite = MockServer::start().await;
    let offsite_port = url::Url::parse(&offsite.uri()).unwrap().port().unwrap();

    // Same machine, but addressed by a host name that is not allowed
    let offsite_detail = format!("http://localhost:{}/title/elsewhere/", offsite_port);
    let offsite_next = format!("http://localhost:{}/search/2", offsite_port);

    Mock::given(method("GET"))
        .and(path("/search/1"))
        .respond_with(html(listing_page(
            &["/title/home/".to_string(), offsite_detail],
            Some(&offsite_next),
        )))
        .expect(1)
        .mount(&site)
        .await;

    Mock::given(method("GET"))
        .and(path("/title/home/"))
        .respond_with(html(detail_page("Home Series", "Jane Doe")))
        .expect(1)
        .mount(&site)
        .await;

    Mock::given(method("GET"))
        .respond_with(html(listing_page(&[], None)))
        .expect(0)
        .mount(&offsite)
        .await;

    let config = create_test_config(
        &format!("{}/search/1", site.uri()),
        OutputFormat::Jsonl,
        "unused.jsonl",
    );
    let sink = MemorySink::new();
    let transport = http_transport(&config);
    let session = CrawlSession::new(&config, Arc::new(transport), Box::new(sink.clone())).unwrap();
    let report = session.run().await.unwrap();

    assert_eq!(report.offsite_dropped, 2);
    assert_eq!(report.records_emitted, 1);
    assert_eq!(sink.records()[0].title.as_deref(), Some("Home Series"));
}

#[tokio::test]
async fn test_robots_txt_respected() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /title/private"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/1"))
        .respond_with(html(listing_page(
            &["/title/public/".to_string(), "/title/private/".to_string()],
            None,
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/title/public/"))
        .respond_with(html(detail_page("Public", "Jane Doe")))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/title/private/"))
        .respond_with(html(detail_page("Private", "Jane Doe")))
        .expect(0)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("series.jsonl");
    let mut config = create_test_config(
        &format!("{}/search/1", base_url),
        OutputFormat::Jsonl,
        output.to_str().unwrap(),
    );
    config.crawler.obey_robots = true;

    let report = CrawlSession::from_config(&config, "testhash", true)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.robots_denied, 1);
    assert_eq!(report.records_emitted, 1);
    // The only listing page had items, so it ends the crawl without counting as drift
    assert_eq!(report.suspected_drift, 0);
}

#[tokio::test]
async fn test_fetch_failures_do_not_abort_crawl() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/1"))
        .respond_with(html(listing_page(
            &[
                "/title/ok/".to_string(),
                "/title/flaky/".to_string(),
                "/title/gone/".to_string(),
                "/title/json/".to_string(),
            ],
            None,
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/title/ok/"))
        .respond_with(html(detail_page("Fine", "Jane Doe")))
        .mount(&mock_server)
        .await;

    // Retried twice after the first attempt, then dropped
    Mock::given(method("GET"))
        .and(path("/title/flaky/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    // Not retryable
    Mock::given(method("GET"))
        .and(path("/title/gone/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/title/json/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("series.jsonl");
    let mut config = create_test_config(
        &format!("{}/search/1", mock_server.uri()),
        OutputFormat::Jsonl,
        output.to_str().unwrap(),
    );
    config.crawler.max_retries = 2;

    let report = CrawlSession::from_config(&config, "testhash", true)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.records_emitted, 1);
    assert_eq!(report.retries, 2);
    assert_eq!(report.fetch_failures.get("http_5xx"), Some(&1));
    assert_eq!(report.fetch_failures.get("http_404"), Some(&1));
    assert_eq!(report.fetch_failures.get("content_mismatch"), Some(&1));
    assert_eq!(report.total_fetch_failures(), 3);
}

#[tokio::test]
async fn test_redirected_listing_resolves_against_final_url() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/search/1"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("{}/v2/search/1", base_url).as_str()),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/search/1"))
        .respond_with(html(listing_page(&["title/relative/".to_string()], None)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/search/title/relative/"))
        .respond_with(html(detail_page("Relative", "Jane Doe")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("series.jsonl");
    let config = create_test_config(
        &format!("{}/search/1", base_url),
        OutputFormat::Jsonl,
        output.to_str().unwrap(),
    );

    let report = CrawlSession::from_config(&config, "testhash", true)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.records_emitted, 1);
}

#[tokio::test]
async fn test_redirect_to_other_host_not_followed() {
    let site = MockServer::start().await;
    let offsite = MockServer::start().await;
    let offsite_port = url::Url::parse(&offsite.uri()).unwrap().port().unwrap();
    let target = format!("http://localhost:{}/title/moved/", offsite_port);

    Mock::given(method("GET"))
        .and(path("/search/1"))
        .respond_with(html(listing_page(
            &["/title/stays/".to_string(), "/title/moved/".to_string()],
            None,
        )))
        .expect(1)
        .mount(&site)
        .await;

    Mock::given(method("GET"))
        .and(path("/title/stays/"))
        .respond_with(html(detail_page("Stays", "Jane Doe")))
        .expect(1)
        .mount(&site)
        .await;

    Mock::given(method("GET"))
        .and(path("/title/moved/"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", target.as_str()))
        .expect(1)
        .mount(&site)
        .await;

    Mock::given(method("GET"))
        .respond_with(html(detail_page("Moved", "Jane Doe")))
        .expect(0)
        .mount(&offsite)
        .await;

    let config = create_test_config(
        &format!("{}/search/1", site.uri()),
        OutputFormat::Jsonl,
        "unused.jsonl",
    );
    let sink = MemorySink::new();
    let session =
        CrawlSession::new(&config, Arc::new(http_transport(&config)), Box::new(sink.clone()))
            .unwrap();
    let report = session.run().await.unwrap();

    assert_eq!(report.offsite_dropped, 1);
    assert_eq!(report.records_emitted, 1);
    assert_eq!(report.total_fetch_failures(), 0);
    assert_eq!(sink.records()[0].title.as_deref(), Some("Stays"));
}

#[tokio::test]
async fn test_sqlite_output_and_markdown_report() {
    let mock_server = MockServer::start().await;
    mount_paginated_site(&mock_server, 1).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("series.db");
    let report_path = temp_dir.path().join("report.md");

    let mut config = create_test_config(
        &format!("{}/search/1", mock_server.uri()),
        OutputFormat::Sqlite,
        db_path.to_str().unwrap(),
    );
    config.output.report_path = Some(report_path.to_string_lossy().into_owned());

    let report = CrawlSession::from_config(&config, "testhash", true)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.records_emitted, 2);

    let runs = load_run_summaries(&db_path).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(runs[0].record_count, 2);
    assert_eq!(runs[0].config_hash, "testhash");

    let markdown = std::fs::read_to_string(&report_path).unwrap();
    assert!(markdown.contains("| Records | 2 |"));
    assert!(markdown.contains("| Listing pages | 2 |"));
}

#[tokio::test]
async fn test_stop_drains_in_flight_fetches() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/1"))
        .respond_with(
            html(listing_page(&["/title/1a/".to_string()], Some("/search/2")))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/2"))
        .respond_with(html(listing_page(&[], None)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(
        &format!("{}/search/1", mock_server.uri()),
        OutputFormat::Jsonl,
        "unused.jsonl",
    );
    let transport = http_transport(&config);
    let session =
        CrawlSession::new(&config, Arc::new(transport), Box::new(MemorySink::new())).unwrap();
    let handle = session.shutdown_handle();
    let running = tokio::spawn(session.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.stop();

    let report = running.await.unwrap().unwrap();

    // The in-flight listing page completed, its follow-ups were abandoned
    assert!(report.stopped_early);
    assert_eq!(report.listing_pages_fetched, 1);
    assert_eq!(report.detail_pages_fetched, 0);
    assert_eq!(report.abandoned_tasks, 2);
}
