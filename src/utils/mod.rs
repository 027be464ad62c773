//! Utility functions and helpers.

pub mod http;

use url::Url;

/// Resolve a potentially relative URL against a base URL.
///
/// Returns `None` when the href cannot be joined onto the base.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(|u| u.to_string())
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turn a search keyword into the dash-separated form used in search paths.
pub fn slugify(keyword: &str) -> String {
    keyword
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://www.olx.pl").unwrap();
        assert_eq!(
            resolve_url(&base, "/d/oferta/lego-ID1.html").as_deref(),
            Some("https://www.olx.pl/d/oferta/lego-ID1.html")
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x").as_deref(),
            Some("https://other.com/x")
        );
    }

    #[test]
    fn test_resolve_url_rejects_unjoinable() {
        let base = Url::parse("https://www.olx.pl").unwrap();
        assert_eq!(resolve_url(&base, "http://[::1"), None);
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  LEGO \n\t Technic  "), "LEGO Technic");
        assert_eq!(normalize_whitespace("   "), "");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Lego  KG"), "lego-kg");
        assert_eq!(slugify("technic"), "technic");
    }
}
