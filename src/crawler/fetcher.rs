//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - The [`Transport`] seam the session fetches through
//! - Building HTTP clients with proper user agent strings
//! - Retry logic for transient failures
//! - Error classification

use crate::config::UserAgentConfig;
use crate::url::DomainPolicy;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// HTTP statuses worth another attempt
const RETRY_STATUS_CODES: &[u16] = &[408, 429, 500, 502, 503, 504, 522, 524];

/// Maximum redirect hops followed per request
const MAX_REDIRECTS: usize = 10;

/// A successfully fetched document
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header value, if any
    pub content_type: Option<String>,
    /// Response body
    pub body: String,
}

impl Page {
    /// True for HTML content types, and for responses without one
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            Some(content_type) => {
                let content_type = content_type.to_ascii_lowercase();
                content_type.contains("text/html") || content_type.contains("application/xhtml+xml")
            }
            None => true,
        }
    }
}

/// Why a URL could not be fetched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("HTTP {status_code}")]
    Http { status_code: u16 },

    #[error("expected HTML, got {content_type}")]
    ContentMismatch { content_type: String },

    #[error("request timeout")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("redirect error: {0}")]
    Redirect(String),

    #[error("redirected outside the allowed domains to {location}")]
    OffsiteRedirect { location: String },

    #[error("network error: {0}")]
    Network(String),
}

impl FetchFailure {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchFailure::Http { status_code } => RETRY_STATUS_CODES.contains(status_code),
            FetchFailure::Timeout | FetchFailure::Connect(_) | FetchFailure::Network(_) => true,
            FetchFailure::ContentMismatch { .. }
            | FetchFailure::Redirect(_)
            | FetchFailure::OffsiteRedirect { .. } => false,
        }
    }

    /// Short label used to group failures in the crawl report
    pub fn kind(&self) -> &'static str {
        match self {
            FetchFailure::Http { status_code } if *status_code == 404 => "http_404",
            FetchFailure::Http { status_code } if *status_code >= 500 => "http_5xx",
            FetchFailure::Http { .. } => "http_other",
            FetchFailure::ContentMismatch { .. } => "content_mismatch",
            FetchFailure::Timeout => "timeout",
            FetchFailure::Connect(_) => "connect",
            FetchFailure::Redirect(_) => "redirect",
            FetchFailure::OffsiteRedirect { .. } => "offsite_redirect",
            FetchFailure::Network(_) => "network",
        }
    }
}

/// Issues GET requests on behalf of the crawl session
///
/// Implementations return the body for any 2xx response and classify
/// everything else as a [`FetchFailure`]. Content-type checks and retries are
/// the caller's business.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<Page, FetchFailure>;
}

/// [`Transport`] backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds a transport with the crawler's user agent and timeout
    ///
    /// Redirects are only followed while they stay inside `domains`.
    pub fn new(
        user_agent: &UserAgentConfig,
        timeout: Duration,
        domains: DomainPolicy,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(user_agent, timeout, domains)?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<Page, FetchFailure> {
        fetch_url(&self.client, url).await
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Total time allowed per request
/// * `domains` - Redirect targets outside these domains are not followed
///
/// # Example
///
/// ```no_run
/// use marquee::config::UserAgentConfig;
/// use marquee::crawler::build_http_client;
/// use marquee::url::DomainPolicy;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "Marquee".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/bot".to_string(),
///     contact_email: "bot@example.com".to_string(),
/// };
///
/// let domains = DomainPolicy::new(vec!["imdb.com".to_string()]);
/// let client = build_http_client(&config, Duration::from_secs(30), domains).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
    domains: DomainPolicy,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .redirect(redirect_policy(domains))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Follows up to [`MAX_REDIRECTS`] hops, stopping at the first hop that
/// leaves the allowed domains so the offsite host is never contacted
fn redirect_policy(domains: DomainPolicy) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if !domains.allows(attempt.url()) {
            attempt.stop()
        } else {
            attempt.follow()
        }
    })
}

/// Fetches a URL once and classifies the outcome
///
/// | Condition | Result |
/// |-----------|--------|
/// | HTTP 2xx | `Ok(Page)` |
/// | Other HTTP status | `Http` |
/// | Timeout | `Timeout` |
/// | Connection refused / DNS / TLS | `Connect` |
/// | Redirect chain > 10 | `Redirect` |
/// | Redirect to a host outside the allowed domains | `OffsiteRedirect` |
/// | Body read failure | `Network` |
pub async fn fetch_url(client: &Client, url: &Url) -> Result<Page, FetchFailure> {
    let response = client.get(url.clone()).send().await.map_err(classify_error)?;

    let status = response.status();

    // The client only hands back a 3xx with a Location when the redirect
    // policy refused to follow it
    if status.is_redirection() {
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| response.url().join(v).ok());
        if let Some(location) = location {
            return Err(FetchFailure::OffsiteRedirect {
                location: location.to_string(),
            });
        }
    }

    if !status.is_success() {
        return Err(FetchFailure::Http {
            status_code: status.as_u16(),
        });
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = response.text().await.map_err(classify_error)?;

    Ok(Page {
        final_url,
        status_code: status.as_u16(),
        content_type,
        body,
    })
}

fn classify_error(e: reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::Timeout
    } else if e.is_redirect() {
        FetchFailure::Redirect(e.to_string())
    } else if e.is_connect() {
        FetchFailure::Connect(e.to_string())
    } else if let Some(status) = e.status() {
        FetchFailure::Http {
            status_code: status.as_u16(),
        }
    } else {
        FetchFailure::Network(e.to_string())
    }
}

/// How transient failures are retried
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }
}

/// Result of a fetch after retries
#[derive(Debug)]
pub struct FetchOutcome {
    pub result: Result<Page, FetchFailure>,
    /// Attempts made beyond the first
    pub retries: u32,
}

/// Fetches through `transport`, retrying transient failures per `policy`
pub async fn fetch_with_retry(
    transport: &dyn Transport,
    url: &Url,
    policy: &RetryPolicy,
) -> FetchOutcome {
    let mut retries = 0;

    loop {
        match transport.get(url).await {
            Ok(page) => {
                return FetchOutcome {
                    result: Ok(page),
                    retries,
                }
            }
            Err(failure) if failure.is_retryable() && retries < policy.max_retries => {
                retries += 1;
                tracing::debug!(
                    "Retrying {} ({}/{}) after {}",
                    url,
                    retries,
                    policy.max_retries,
                    failure
                );
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
            }
            Err(failure) => {
                return FetchOutcome {
                    result: Err(failure),
                    retries,
                }
            }
        }
    }
}
