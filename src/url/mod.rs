//! URL handling module for Marquee
//!
//! This module provides domain extraction, allowed-domain matching and link
//! resolution against the page a link was found on.

mod domain;
mod matcher;

pub use domain::extract_domain;
pub use matcher::matches_domain;

use crate::{UrlError, UrlResult};
use url::Url;

/// Allowed-domain policy applied before any fetch is dispatched
#[derive(Debug, Clone)]
pub struct DomainPolicy {
    allowed: Vec<String>,
}

impl DomainPolicy {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    /// Returns true if the URL's host is covered by an allowed-domain entry
    ///
    /// # Examples
    ///
    /// ```
    /// use marquee::url::DomainPolicy;
    /// use url::Url;
    ///
    /// let policy = DomainPolicy::new(vec!["imdb.com".to_string()]);
    /// assert!(policy.allows(&Url::parse("https://www.imdb.com/title/tt0903747/").unwrap()));
    /// assert!(!policy.allows(&Url::parse("https://www.amazon.com/").unwrap()));
    /// ```
    pub fn allows(&self, url: &Url) -> bool {
        match extract_domain(url) {
            Some(domain) => self
                .allowed
                .iter()
                .any(|pattern| matches_domain(pattern, &domain)),
            None => false,
        }
    }

    pub fn allowed_domains(&self) -> &[String] {
        &self.allowed
    }
}

/// Resolves an href found on a page to an absolute, fetchable URL
///
/// Returns None if the link should be skipped:
/// - empty or fragment-only hrefs
/// - javascript:, mailto:, tel: and data: links
/// - links that do not resolve to HTTP or HTTPS
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url)
        }
        _ => None,
    }
}

/// Parses a seed URL, requiring an HTTP(S) scheme and a host
pub fn parse_seed(url_str: &str) -> UrlResult<Url> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://www.imdb.com/search/title/?title_type=tv_series").unwrap()
    }

    #[test]
    fn test_policy_allows_subdomains() {
        let policy = DomainPolicy::new(vec!["imdb.com".to_string()]);
        assert!(policy.allows(&Url::parse("https://imdb.com/").unwrap()));
        assert!(policy.allows(&Url::parse("https://m.imdb.com/title/tt1").unwrap()));
        assert!(policy.allows(&Url::parse("http://WWW.IMDB.COM:8080/x").unwrap()));
    }

    #[test]
    fn test_policy_rejects_other_hosts() {
        let policy = DomainPolicy::new(vec!["imdb.com".to_string()]);
        assert!(!policy.allows(&Url::parse("https://pro.imdb.org/").unwrap()));
        assert!(!policy.allows(&Url::parse("https://fakeimdb.com/").unwrap()));
    }

    #[test]
    fn test_policy_multiple_entries() {
        let policy = DomainPolicy::new(vec!["imdb.com".to_string(), "media-imdb.com".to_string()]);
        assert!(policy.allows(&Url::parse("https://m.media-imdb.com/images/x").unwrap()));
        assert_eq!(policy.allowed_domains().len(), 2);
    }

    #[test]
    fn test_resolve_relative_link() {
        let resolved = resolve_link("/title/tt0903747/?ref_=adv_li_tt", &base_url()).unwrap();
        assert_eq!(
            resolved.as_str(),
            "https://www.imdb.com/title/tt0903747/?ref_=adv_li_tt"
        );
    }

    #[test]
    fn test_resolve_absolute_link() {
        let resolved = resolve_link("https://other.com/page", &base_url()).unwrap();
        assert_eq!(resolved.as_str(), "https://other.com/page");
    }

    #[test]
    fn test_resolve_query_only_link() {
        let resolved = resolve_link("?title_type=tv_series&start=51", &base_url()).unwrap();
        assert_eq!(
            resolved.as_str(),
            "https://www.imdb.com/search/title/?title_type=tv_series&start=51"
        );
    }

    #[test]
    fn test_skip_special_schemes() {
        assert!(resolve_link("javascript:void(0)", &base_url()).is_none());
        assert!(resolve_link("JavaScript:void(0)", &base_url()).is_none());
        assert!(resolve_link("mailto:test@example.com", &base_url()).is_none());
        assert!(resolve_link("tel:+1234567890", &base_url()).is_none());
        assert!(resolve_link("data:text/html,<h1>x</h1>", &base_url()).is_none());
        assert!(resolve_link("ftp://files.imdb.com/", &base_url()).is_none());
    }

    #[test]
    fn test_skip_empty_and_fragment() {
        assert!(resolve_link("", &base_url()).is_none());
        assert!(resolve_link("   ", &base_url()).is_none());
        assert!(resolve_link("#main", &base_url()).is_none());
    }

    #[test]
    fn test_parse_seed() {
        assert!(parse_seed("https://www.imdb.com/search/title/").is_ok());
        assert!(matches!(
            parse_seed("file:///tmp/list.html"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(parse_seed("nonsense"), Err(UrlError::Parse(_))));
    }
}
