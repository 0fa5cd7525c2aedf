use serde::Deserialize;

/// Main configuration structure for Marquee
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// First listing page of the crawl
    #[serde(rename = "seed-url")]
    pub seed_url: String,

    /// Domains the crawl may visit; subdomains of an entry are allowed too
    #[serde(rename = "allowed-domains")]
    pub allowed_domains: Vec<String>,

    /// Maximum number of fetches in flight at once
    #[serde(rename = "max-concurrent-requests", default = "default_concurrency")]
    pub max_concurrent_requests: u32,

    /// Minimum time between two dispatched fetches (milliseconds)
    #[serde(rename = "download-delay", default)]
    pub download_delay: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_timeout")]
    pub request_timeout: u64,

    /// Retries for a transient fetch failure before the task is dropped
    #[serde(rename = "max-retries", default = "default_retries")]
    pub max_retries: u32,

    /// Pause before each retry (milliseconds)
    #[serde(rename = "retry-delay", default = "default_retry_delay")]
    pub retry_delay: u64,

    /// Check robots.txt before every fetch
    #[serde(rename = "obey-robots", default = "default_true")]
    pub obey_robots: bool,

    /// Stop issuing fetches after this many records; 0 means unlimited
    #[serde(rename = "max-records", default)]
    pub max_records: u64,
}

fn default_concurrency() -> u32 {
    16
}

fn default_timeout() -> u64 {
    180
}

fn default_retries() -> u32 {
    2
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Where records go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per line
    Jsonl,
    /// SQLite database with `runs` and `records` tables
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,

    /// Path of the JSON Lines file or SQLite database
    pub path: String,

    /// Optional path for a markdown crawl report
    #[serde(rename = "report-path", default)]
    pub report_path: Option<String>,
}

/// CSS selectors for both crawl stages
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectorConfig {
    #[serde(default)]
    pub listing: ListingSelectors,
    #[serde(default)]
    pub detail: DetailSelectors,
}

/// Selectors applied to listing pages
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    /// One block per listed title
    #[serde(rename = "item-header")]
    pub item_header: String,

    /// The outbound link among an item header's direct children
    #[serde(rename = "item-link")]
    pub item_link: String,

    /// The link to the following listing page
    #[serde(rename = "next-page")]
    pub next_page: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            item_header: "h3.lister-item-header".to_string(),
            item_link: "a[href]".to_string(),
            next_page: "a.lister-page-next.next-page".to_string(),
        }
    }
}

/// A scalar field selector
///
/// Without `nth` the first match with text is taken and a miss leaves the
/// field absent. With `nth` the match at that position is required.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldSelector {
    pub css: String,
    #[serde(default)]
    pub nth: Option<usize>,
}

impl FieldSelector {
    pub fn first(css: &str) -> Self {
        Self {
            css: css.to_string(),
            nth: None,
        }
    }

    pub fn nth(css: &str, index: usize) -> Self {
        Self {
            css: css.to_string(),
            nth: Some(index),
        }
    }
}

/// Inline list of release date, country and language links on older detail pages.
///
/// Kept for configurations that still address these fields by position.
pub const SHARED_DETAILS_LIST: &str = "div.sc-f65f65be-0.ktSkVi ul.ipc-inline-list.ipc-inline-list--show-dividers.ipc-inline-list--inline.ipc-metadata-list-item__list-content.base a";

/// Selectors applied to detail pages
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetailSelectors {
    pub title: FieldSelector,

    #[serde(rename = "global-rating")]
    pub global_rating: FieldSelector,

    #[serde(rename = "num-of-voters")]
    pub num_of_voters: FieldSelector,

    #[serde(rename = "release-date")]
    pub release_date: FieldSelector,

    pub country: FieldSelector,

    #[serde(rename = "award-wins-nominations")]
    pub award_wins_nominations: String,

    pub creators: String,
}

impl DetailSelectors {
    /// Release date and country read by position from one shared match set
    pub fn shared_details_list() -> Self {
        Self {
            release_date: FieldSelector::nth(SHARED_DETAILS_LIST, 0),
            country: FieldSelector::nth(SHARED_DETAILS_LIST, 1),
            ..Self::default()
        }
    }
}

impl Default for DetailSelectors {
    fn default() -> Self {
        Self {
            title: FieldSelector::first(r#"div[class*="sc-80d4314-1 fbQftq"] > h1"#),
            global_rating: FieldSelector::first(
                "div.sc-7ab21ed2-2.kYEdvH > span.sc-7ab21ed2-1.jGRxWM",
            ),
            num_of_voters: FieldSelector::first(
                r#"div[class*="sc-7ab21ed2-0 fAePGh"] > div[class*="sc-7ab21ed2-3 dPVcnq"]"#,
            ),
            release_date: FieldSelector::first(
                r#"li[data-testid="title-details-releasedate"] a.ipc-metadata-list-item__list-content-item"#,
            ),
            country: FieldSelector::first(
                r#"li[data-testid="title-details-origin"] a.ipc-metadata-list-item__list-content-item"#,
            ),
            award_wins_nominations: "div.sc-fcdc3619-0.YgLMu.base ul.ipc-inline-list.ipc-inline-list--show-dividers.ipc-inline-list--inline.ipc-metadata-list-item__list-content.base span".to_string(),
            creators: "ul.sc-36c36dd0-9.fEgKYH a.ipc-metadata-list-item__list-content-item--link"
                .to_string(),
        }
    }
}
