//! Robots.txt rules backed by the robotstxt crate

use robotstxt::DefaultMatcher;
use url::Url;

/// Robots.txt rules for one origin
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt body
    content: String,
    /// Set when the file was missing or unreadable
    allow_all: bool,
}

impl ParsedRobots {
    /// Creates rules from a robots.txt body
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Creates a permissive rule set that allows everything
    ///
    /// This is used when robots.txt is missing or cannot be fetched.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    pub fn is_allow_all(&self) -> bool {
        self.allow_all || self.content.trim().is_empty()
    }

    /// Checks whether `url` may be fetched by `user_agent`
    ///
    /// `user_agent` is the product token (the crawler name), not the full
    /// User-Agent header.
    pub fn is_allowed(&self, url: &Url, user_agent: &str) -> bool {
        if self.is_allow_all() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url.as_str())
    }
}
