//! Domain-format validation shared by every endpoint that accepts a client
//! or competitor domain as a path/body parameter.

use once_cell::sync::Lazy;
use regex::Regex;

static HOSTNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}$").unwrap()
});

/// Validates a bare hostname (no scheme, no path) such as `acme.test`.
pub fn is_valid_domain(domain: &str) -> bool {
    !domain.is_empty() && domain.len() <= 253 && HOSTNAME_RE.is_match(domain)
}

/// Derives the per-domain article collection name, e.g. `articles__acme.test`.
pub fn articles_collection_name(domain: &str) -> String {
    format!("articles__{domain}")
}

pub const CENTROIDS_COLLECTION: &str = "centroids";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_domains() {
        assert!(is_valid_domain("acme.test"));
        assert!(is_valid_domain("sub.acme.co.uk"));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("http://acme.test"));
        assert!(!is_valid_domain("acme"));
        assert!(!is_valid_domain("-acme.test"));
    }

    #[test]
    fn derives_collection_names() {
        assert_eq!(articles_collection_name("acme.test"), "articles__acme.test");
    }
}
