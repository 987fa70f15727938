use url::{form_urlencoded, Url};

use crate::{config::Config, error::Result};

/// Drop one trailing `/` from a path, unless the path is the root.
pub fn strip_trailing_slash(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => path,
    }
}

/// Normalize `url` with the built-in ignored parameters.
/// See [`Normalizer::normalize`].
pub fn normalize(url: &str, base: &str) -> String {
    Normalizer::new(Config::builtin()).normalize(url, base)
}

/// Turns URLs into strings that can be compared against each other: ignored
/// query parameters removed, the rest sorted by name, and one trailing slash
/// stripped from the path.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    config: &'a Config,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Resolve `url` against `base` and normalize it. If either fails to
    /// parse, `url` is returned untouched.
    pub fn normalize(&self, url: &str, base: &str) -> String {
        match self.try_normalize(url, base) {
            Ok(normalized) => normalized,
            Err(err) => {
                tracing::debug!(url, base, %err, "keeping url that failed to parse");
                url.to_owned()
            }
        }
    }

    pub fn try_normalize(&self, url: &str, base: &str) -> Result<String> {
        let base = Url::parse(base)?;
        let url = base.join(url)?;
        Ok(self.normalize_url(url))
    }

    pub fn normalize_url(&self, mut url: Url) -> String {
        // Opaque paths (`mailto:` and friends) have no hierarchy to trim.
        if !url.cannot_be_a_base() {
            let path = url.path();
            let stripped = strip_trailing_slash(path);
            if stripped.len() != path.len() {
                let stripped = stripped.to_owned();
                url.set_path(&stripped);
            }
        }

        if url.query().is_some_and(|q| !q.is_empty()) {
            self.clean_query(&mut url);
        }

        url.into()
    }

    fn clean_query(&self, url: &mut Url) {
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, _)| !self.config.is_ignored(name))
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();

        // Stable, and ordered by UTF-16 code units so the result matches
        // what a browser's `URLSearchParams.sort()` produces.
        params.sort_by(|(a, _), (b, _)| a.encode_utf16().cmp(b.encode_utf16()));

        if params.is_empty() {
            url.set_query(None);
        } else {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&params)
                .finish();
            url.set_query(Some(&query));
        }
    }
}
