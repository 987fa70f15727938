use url::Url;

use crate::{config::Config, document::LinkDocument, link::CandidateLink, uri::Normalizer};

bitflags::bitflags! {
    /// How a link relates to the current location.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Match: u8 {
        const ACTIVE   = 0b1;
        const ANCESTOR = 0b10;
    }
}

/// Run a pass over `document` with the built-in config.
/// See [`Matcher::apply`].
pub fn apply_active_state<D: LinkDocument>(document: &mut D, location: &str) {
    Matcher::default().apply(document, location)
}

/// Classifies the links of a document against its location and marks them
/// with the configured classes.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: Config,
}

impl Matcher {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn normalizer(&self) -> Normalizer<'_> {
        Normalizer::new(&self.config)
    }

    /// Compare one normalized link against the normalized location.
    ///
    /// A link is an ancestor when the location starts with it, unless the
    /// link is just the origin root, which every page would start with.
    /// A link equal to the location is both active and an ancestor.
    pub fn classify(&self, link: &str, current: &str, origin: &str) -> Match {
        let mut m = Match::empty();
        if link.len() > origin.len() + 1 && current.starts_with(link) {
            m |= Match::ANCESTOR;
        }
        if link == current {
            m |= Match::ACTIVE;
        }
        m
    }

    /// Classify every same-origin http(s) link of `document`, in document
    /// order. Other links are left out. Nothing is modified.
    pub fn classify_document<D: LinkDocument>(
        &self,
        document: &D,
        location: &str,
    ) -> Vec<(D::Element, Match)> {
        let location = match Url::parse(location) {
            Ok(url) => url,
            Err(err) => {
                tracing::debug!(location, %err, "location does not parse, nothing can match");
                return Vec::new();
            }
        };
        let origin = location.origin().ascii_serialization();
        let normalizer = self.normalizer();
        let current = normalizer.normalize_url(location.clone());

        let mut out = Vec::new();
        for element in document.links() {
            let Some(href) = document.href(&element) else {
                continue;
            };
            let Some(link) = CandidateLink::resolve(element, &href, &location) else {
                continue;
            };
            if !link.is_http() || link.origin() != origin {
                continue;
            }

            let comparable = link.comparable(&normalizer);
            let m = self.classify(&comparable, &current, &origin);
            tracing::trace!(link = %comparable, ?m, "classified");
            out.push((link.into_element(), m));
        }
        out
    }

    /// Strip both classes from every element carrying them, then mark the
    /// links matching `location`. Running it twice gives the same result as
    /// running it once.
    pub fn apply<D: LinkDocument>(&self, document: &mut D, location: &str) {
        self.clear(document);

        let classified = self.classify_document(document, location);
        let (mut active, mut ancestor) = (0, 0);
        for (element, m) in &classified {
            if m.contains(Match::ANCESTOR) {
                document.add_class(element, self.config.ancestor_class());
                ancestor += 1;
            }
            if m.contains(Match::ACTIVE) {
                document.add_class(element, self.config.active_class());
                active += 1;
            }
        }

        tracing::debug!(
            location,
            links = classified.len(),
            active,
            ancestor,
            "active links updated"
        );
    }

    fn clear<D: LinkDocument>(&self, document: &mut D) {
        let classes = self.config.classes();
        for element in document.query_selector_all(&self.config.clear_selector()) {
            document.remove_classes(&element, &classes);
        }
    }
}
