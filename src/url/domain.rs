use url::Url;

/// Extracts the lowercase host of a URL
///
/// The port is not part of the result. Returns None for URLs without a host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use marquee::url::extract_domain;
///
/// let url = Url::parse("https://WWW.IMDb.com/title/tt0903747/").unwrap();
/// assert_eq!(extract_domain(&url), Some("www.imdb.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}
