//! Per-origin robots.txt cache
//!
//! Entries expire after 24 hours so long crawls pick up changes made by the
//! site owner.

use crate::crawler::Transport;
use crate::robots::{fetch_robots, ParsedRobots};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use url::Url;

/// Robots.txt rules along with when they were fetched
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub content: ParsedRobots,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// True once the entry is older than 24 hours
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

/// Robots.txt rules keyed by origin, fetched on first use
///
/// Owned by the crawl session and consulted before each dispatch.
#[derive(Debug)]
pub struct RobotsCache {
    user_agent: String,
    entries: HashMap<String, CachedRobots>,
}

impl RobotsCache {
    /// Creates an empty cache matching rules for `user_agent`
    pub fn new(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Checks `url` against its origin's robots.txt, fetching it if needed
    pub async fn is_allowed(&mut self, transport: &dyn Transport, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();

        let needs_fetch = self
            .entries
            .get(&origin)
            .map_or(true, |cached| cached.is_stale());

        if needs_fetch {
            tracing::debug!("Fetching robots.txt for {}", origin);
            let robots = fetch_robots(transport, url).await;
            self.entries.insert(origin.clone(), CachedRobots::new(robots));
        }

        self.entries
            .get(&origin)
            .map_or(true, |cached| cached.content.is_allowed(url, &self.user_agent))
    }

    /// Seeds the cache for an origin without fetching
    pub fn insert(&mut self, origin: &Url, robots: ParsedRobots) {
        self.entries.insert(
            origin.origin().ascii_serialization(),
            CachedRobots::new(robots),
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
