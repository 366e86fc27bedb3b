//! Parsing context for catalog page extraction

use url::Url;

/// Context information for parsing one catalog page
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Page number being parsed
    pub page: u32,

    /// URL the page was fetched from; relative links resolve against it
    pub base_url: Url,
}

impl ParseContext {
    pub fn new(page: u32, base_url: Url) -> Self {
        Self { page, base_url }
    }

    /// Resolve an `href` against the page URL
    pub fn resolve_link(&self, href: &str) -> Option<Url> {
        self.base_url.join(href.trim()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute_links() {
        let ctx = ParseContext::new(
            3,
            Url::parse("https://renascene.com/ps3/?target=list&page=3").unwrap(),
        );
        assert_eq!(
            ctx.resolve_link("?target=nfo&id=12").unwrap().as_str(),
            "https://renascene.com/ps3/?target=nfo&id=12"
        );
        assert_eq!(
            ctx.resolve_link("/info/77").unwrap().as_str(),
            "https://renascene.com/info/77"
        );
        assert_eq!(
            ctx.resolve_link("https://other.example/x").unwrap().as_str(),
            "https://other.example/x"
        );
    }
}
