//! Detail extractor: turns one title page into exactly one [`Record`]
//!
//! Each field is read by one rule:
//! - **first**: text of the first match, absent when nothing matches
//! - **nth**: text of the match at a fixed position, a [`ExtractError::SelectorIndex`]
//!   when there are not enough matches
//! - **all**: text of every match, in document order
//!
//! The text of an element is its own text nodes joined together, as served.
//! Nothing is trimmed, parsed or checked.

use crate::config::{DetailSelectors, FieldSelector};
use crate::crawler::compile_selector;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fields extracted from one detail page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub title: Option<String>,
    pub global_rating: Option<String>,
    pub num_of_voters: Option<String>,
    pub release_date: Option<String>,
    pub country: Option<String>,
    pub award_wins_nominations: Vec<String>,
    pub creators: Vec<String>,
}

/// A positional rule that could not be satisfied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("{field}: selector matched {found} element(s) but position {index} was requested")]
    SelectorIndex {
        field: &'static str,
        index: usize,
        found: usize,
    },
}

/// The record for a page plus any rule failures met while building it
///
/// A failed rule leaves its field absent; the record is still produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub record: Record,
    pub errors: Vec<ExtractError>,
}

impl Extraction {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// The record, or the first rule failure
    pub fn into_result(self) -> Result<Record, ExtractError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(self.record),
        }
    }
}

#[derive(Debug, Clone)]
enum ScalarRule {
    First(Selector),
    Nth(Selector, usize),
}

impl ScalarRule {
    fn compile(field: &str, selector: &FieldSelector) -> Result<Self, ConfigError> {
        let compiled = compile_selector(field, &selector.css)?;
        Ok(match selector.nth {
            Some(index) => ScalarRule::Nth(compiled, index),
            None => ScalarRule::First(compiled),
        })
    }

    fn apply(
        &self,
        document: &Html,
        field: &'static str,
    ) -> Result<Option<String>, ExtractError> {
        match self {
            ScalarRule::First(selector) => Ok(document.select(selector).find_map(own_text)),
            ScalarRule::Nth(selector, index) => {
                let mut texts = all_texts(document, selector);
                if *index < texts.len() {
                    Ok(Some(texts.swap_remove(*index)))
                } else {
                    Err(ExtractError::SelectorIndex {
                        field,
                        index: *index,
                        found: texts.len(),
                    })
                }
            }
        }
    }
}

/// Compiled detail-page rules
#[derive(Debug, Clone)]
pub struct DetailRules {
    title: ScalarRule,
    global_rating: ScalarRule,
    num_of_voters: ScalarRule,
    release_date: ScalarRule,
    country: ScalarRule,
    award_wins_nominations: Selector,
    creators: Selector,
}

impl DetailRules {
    /// Compiles the configured selectors
    pub fn compile(selectors: &DetailSelectors) -> Result<Self, ConfigError> {
        Ok(Self {
            title: ScalarRule::compile("detail.title", &selectors.title)?,
            global_rating: ScalarRule::compile("detail.global-rating", &selectors.global_rating)?,
            num_of_voters: ScalarRule::compile("detail.num-of-voters", &selectors.num_of_voters)?,
            release_date: ScalarRule::compile("detail.release-date", &selectors.release_date)?,
            country: ScalarRule::compile("detail.country", &selectors.country)?,
            award_wins_nominations: compile_selector(
                "detail.award-wins-nominations",
                &selectors.award_wins_nominations,
            )?,
            creators: compile_selector("detail.creators", &selectors.creators)?,
        })
    }

    /// Extracts a record from a detail page body
    ///
    /// Always returns a record, even for a page where nothing matches.
    pub fn extract(&self, html: &str) -> Extraction {
        let document = Html::parse_document(html);
        let mut errors = Vec::new();

        let mut scalar = |rule: &ScalarRule, field: &'static str| match rule.apply(&document, field) {
            Ok(value) => value,
            Err(error) => {
                errors.push(error);
                None
            }
        };

        let title = scalar(&self.title, "title");
        let global_rating = scalar(&self.global_rating, "global_rating");
        let num_of_voters = scalar(&self.num_of_voters, "num_of_voters");
        let release_date = scalar(&self.release_date, "release_date");
        let country = scalar(&self.country, "country");

        let record = Record {
            title,
            global_rating,
            num_of_voters,
            release_date,
            country,
            award_wins_nominations: all_texts(&document, &self.award_wins_nominations),
            creators: all_texts(&document, &self.creators),
        };

        Extraction { record, errors }
    }
}

/// Concatenated direct text children; None for an element with no text nodes
fn own_text(element: ElementRef<'_>) -> Option<String> {
    let mut text: Option<String> = None;
    for child in element.children() {
        if let Some(node) = child.value().as_text() {
            text.get_or_insert_with(String::new).push_str(node);
        }
    }
    text
}

fn all_texts(document: &Html, selector: &Selector) -> Vec<String> {
    document.select(selector).filter_map(own_text).collect()
}
