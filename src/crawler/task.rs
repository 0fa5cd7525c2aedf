//! Fetch tasks flowing through the crawl queue

use std::fmt;
use url::Url;

/// Which extractor a fetched page is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Paginated results page, handled by the frontier walker
    Listing,
    /// Single title page, handled by the detail extractor
    Detail,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Listing => write!(f, "listing"),
            Stage::Detail => write!(f, "detail"),
        }
    }
}

/// A URL waiting to be fetched, tagged with its stage
///
/// `listing_page` is the 1-based number of the listing page the task was
/// discovered on (for listing tasks, the page the URL itself is).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub url: Url,
    pub stage: Stage,
    pub listing_page: u32,
}

impl FetchTask {
    pub fn listing(url: Url, listing_page: u32) -> Self {
        Self {
            url,
            stage: Stage::Listing,
            listing_page,
        }
    }

    pub fn detail(url: Url, listing_page: u32) -> Self {
        Self {
            url,
            stage: Stage::Detail,
            listing_page,
        }
    }
}

impl fmt::Display for FetchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} p{}] {}", self.stage, self.listing_page, self.url)
    }
}
