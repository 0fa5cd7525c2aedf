//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! A missing or unreachable robots.txt allows everything.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::ParsedRobots;

use crate::crawler::Transport;
use url::Url;

/// Fetches robots.txt for the origin of `url`
///
/// Never fails: any fetch failure (404 included) yields an allow-all rule set.
pub async fn fetch_robots(transport: &dyn Transport, url: &Url) -> ParsedRobots {
    let robots_url = match url.join("/robots.txt") {
        Ok(robots_url) => robots_url,
        Err(e) => {
            tracing::debug!("Cannot build robots.txt URL for {}: {}", url, e);
            return ParsedRobots::allow_all();
        }
    };

    match transport.get(&robots_url).await {
        Ok(page) => ParsedRobots::from_content(&page.body),
        Err(failure) => {
            tracing::debug!("No robots.txt at {} ({}), allowing all", robots_url, failure);
            ParsedRobots::allow_all()
        }
    }
}
