//! Frontier walker: turns one listing page into follow-up fetch tasks
//!
//! A listing page yields one detail task per item header and at most one
//! continuation task for the next listing page. Finding nothing is not an
//! error; the walker just reports how many item headers it saw so callers can
//! tell an exhausted listing from a page whose markup no longer matches.

use crate::config::ListingSelectors;
use crate::crawler::compile_selector;
use crate::crawler::task::FetchTask;
use crate::url::resolve_link;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Compiled listing-page selectors
#[derive(Debug, Clone)]
pub struct ListingRules {
    item_header: Selector,
    item_link: Selector,
    next_page: Selector,
}

/// Everything the walker found on one listing page
#[derive(Debug, Clone)]
pub struct ListingPage {
    /// Number of item header blocks matched
    pub item_headers: usize,

    /// One task per resolvable item link, in document order
    pub detail_tasks: Vec<FetchTask>,

    /// The continuation, if the page links to a next page
    pub next_page: Option<FetchTask>,
}

impl ListingPage {
    /// True when no item header matched at all
    ///
    /// An empty listing is indistinguishable from changed markup, so the
    /// session logs and counts these pages.
    pub fn is_empty(&self) -> bool {
        self.item_headers == 0
    }

    /// Detail tasks first, then the continuation
    pub fn into_tasks(self) -> Vec<FetchTask> {
        let mut tasks = self.detail_tasks;
        tasks.extend(self.next_page);
        tasks
    }
}

impl ListingRules {
    /// Compiles the configured selectors
    pub fn compile(selectors: &ListingSelectors) -> Result<Self, ConfigError> {
        Ok(Self {
            item_header: compile_selector("listing.item-header", &selectors.item_header)?,
            item_link: compile_selector("listing.item-link", &selectors.item_link)?,
            next_page: compile_selector("listing.next-page", &selectors.next_page)?,
        })
    }

    /// Walks one listing page
    ///
    /// # Arguments
    ///
    /// * `html` - The listing page body
    /// * `page_url` - The URL the page was served from, used to resolve relative links
    /// * `page_number` - The 1-based position of this page in the pagination chain
    pub fn walk(&self, html: &str, page_url: &Url, page_number: u32) -> ListingPage {
        let document = Html::parse_document(html);

        let mut item_headers = 0;
        let mut detail_tasks = Vec::new();

        for header in document.select(&self.item_header) {
            item_headers += 1;

            // Only direct children of the header count as its link
            let link = header
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|child| self.item_link.matches(child))
                .find_map(|anchor| anchor.value().attr("href"))
                .and_then(|href| resolve_link(href, page_url));

            match link {
                Some(url) => detail_tasks.push(FetchTask::detail(url, page_number)),
                None => tracing::debug!(
                    "Item header #{} on listing page {} has no followable link",
                    item_headers,
                    page_number
                ),
            }
        }

        let next_page = document
            .select(&self.next_page)
            .find_map(|anchor| anchor.value().attr("href"))
            .and_then(|href| resolve_link(href, page_url))
            .map(|url| FetchTask::listing(url, page_number + 1));

        ListingPage {
            item_headers,
            detail_tasks,
            next_page,
        }
    }
}
