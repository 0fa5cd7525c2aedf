/// Checks if a host falls under an allowed-domain entry
///
/// An entry covers the domain itself and every subdomain of it, so
/// `"imdb.com"` admits `"www.imdb.com"` and `"m.imdb.com"`. A leading `"*."`
/// is accepted and means the same thing. Entries are compared without regard
/// to case; the candidate is expected to be lowercase already.
///
/// # Examples
///
/// ```
/// use marquee::url::matches_domain;
///
/// assert!(matches_domain("imdb.com", "imdb.com"));
/// assert!(matches_domain("imdb.com", "www.imdb.com"));
/// assert!(matches_domain("*.imdb.com", "m.imdb.com"));
/// assert!(!matches_domain("imdb.com", "notimdb.com"));
/// ```
pub fn matches_domain(pattern: &str, candidate: &str) -> bool {
    let base = pattern.strip_prefix("*.").unwrap_or(pattern);
    if base.is_empty() || candidate.is_empty() {
        return false;
    }

    let base = base.to_lowercase();
    candidate == base || candidate.ends_with(&format!(".{}", base))
}
