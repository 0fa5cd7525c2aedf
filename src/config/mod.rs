//! Configuration module for Marquee
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use marquee::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("marquee.toml")).unwrap();
//! println!("Crawl starts at: {}", config.crawler.seed_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, DetailSelectors, FieldSelector, ListingSelectors, OutputConfig,
    OutputFormat, SelectorConfig, UserAgentConfig, SHARED_DETAILS_LIST,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
