use url::Url;

use crate::uri::{strip_trailing_slash, Normalizer};

/// A hyperlink of a document, resolved against the page location.
/// Built fresh on every matching pass.
#[derive(Debug, Clone)]
pub struct CandidateLink<E> {
    element: E,
    url: Url,
}

impl<E> CandidateLink<E> {
    /// Resolve `href` relative to `location`. Hrefs that do not form a
    /// valid URL yield `None`.
    pub fn resolve(element: E, href: &str, location: &Url) -> Option<Self> {
        match location.join(href) {
            Ok(url) => Some(Self { element, url }),
            Err(err) => {
                tracing::trace!(href, %err, "skipping unresolvable link");
                None
            }
        }
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn into_element(self) -> E {
        self.element
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn is_http(&self) -> bool {
        matches!(self.scheme(), "http" | "https")
    }

    /// Serialized origin, e.g. `https://x.com:8080`.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// The query string, `None` when absent or empty.
    pub fn query(&self) -> Option<&str> {
        self.url.query().filter(|q| !q.is_empty())
    }

    /// The fragment, `None` when absent or empty.
    pub fn fragment(&self) -> Option<&str> {
        self.url.fragment().filter(|f| !f.is_empty())
    }

    /// The string this link is compared with. Links without a query skip
    /// the full normalizer and are assembled from their parts.
    pub fn comparable(&self, normalizer: &Normalizer<'_>) -> String {
        if self.query().is_some() {
            return normalizer.normalize_url(self.url.clone());
        }

        let mut out = self.origin();
        out.push_str(strip_trailing_slash(self.path()));
        if let Some(fragment) = self.fragment() {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn link(href: &str) -> Option<CandidateLink<()>> {
        let location = Url::parse("https://x.com/docs/intro").unwrap();
        CandidateLink::resolve((), href, &location)
    }

    #[test]
    fn components() {
        let l = link("../guide/?b=1#top").unwrap();
        assert_eq!(l.scheme(), "https");
        assert_eq!(l.origin(), "https://x.com");
        assert_eq!(l.path(), "/guide/");
        assert_eq!(l.query(), Some("b=1"));
        assert_eq!(l.fragment(), Some("top"));
        assert!(l.is_http());
    }

    #[test]
    fn empty_parts_are_none() {
        let l = link("/a?#").unwrap();
        assert_eq!(l.query(), None);
        assert_eq!(l.fragment(), None);
    }

    #[test]
    fn non_http() {
        assert!(!link("mailto:user@x.com").unwrap().is_http());
        assert!(!link("tel:+100").unwrap().is_http());
        assert!(!link("javascript:void(0)").unwrap().is_http());
        assert!(link("http://[::1").is_none());
    }

    #[test]
    fn fast_path_agrees_with_normalizer() {
        let normalizer = Normalizer::new(Config::builtin());
        for href in ["/docs/", "/docs/intro#part", "/", "https://x.com:8443/a/"] {
            let l = link(href).unwrap();
            assert!(l.query().is_none());
            assert_eq!(
                l.comparable(&normalizer),
                normalizer.normalize_url(l.url().clone()),
                "{href}"
            );
        }
    }

    #[test]
    fn slow_path_cleans_query() {
        let normalizer = Normalizer::new(Config::builtin());
        let l = link("/docs/?utm_campaign=x&z=1&a=2").unwrap();
        assert_eq!(l.comparable(&normalizer), "https://x.com/docs?a=2&z=1");
    }
}
