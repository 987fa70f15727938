use std::collections::BTreeSet;
use std::sync::OnceLock;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const ANCESTOR_CLASS: &str = "is-ancestor";
pub const ACTIVE_CLASS: &str = "is-active";

/// Query parameters that never take part in a comparison.
pub const IGNORED_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "fbclid",
    "gclid",
    "ref",
];

/// Class names and ignored query parameters used by a [`Matcher`].
///
/// Only built through [`Config::new`], [`Config::from_toml_str`] or
/// `Default`, so the class names are always valid.
///
/// [`Matcher`]: crate::Matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    ancestor_class: String,
    active_class: String,
    ignored_params: BTreeSet<String>,
}

/// On-disk form of [`Config`], checked before use.
#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    ancestor_class: String,
    active_class: String,
    ignored_params: BTreeSet<String>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let Config {
            ancestor_class,
            active_class,
            ignored_params,
        } = Config::default();
        Self {
            ancestor_class,
            active_class,
            ignored_params,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ancestor_class: ANCESTOR_CLASS.to_owned(),
            active_class: ACTIVE_CLASS.to_owned(),
            ignored_params: IGNORED_PARAMS.iter().map(|&p| p.to_owned()).collect(),
        }
    }
}

impl Config {
    /// Shared instance of [`Config::default`].
    pub fn builtin() -> &'static Config {
        static BUILTIN: OnceLock<Config> = OnceLock::new();
        BUILTIN.get_or_init(Config::default)
    }

    pub fn new<I, S>(active_class: &str, ancestor_class: &str, ignored_params: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let config = Self {
            ancestor_class: ancestor_class.to_owned(),
            active_class: active_class.to_owned(),
            ignored_params: ignored_params.into_iter().map(Into::into).collect(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Read a config from TOML. Keys left out keep their defaults.
    ///
    /// ```toml
    /// active_class = "current"
    /// ignored_params = ["utm_source", "session"]
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(s)?;
        let config = Self {
            ancestor_class: file.ancestor_class,
            active_class: file.active_class,
            ignored_params: file.ignored_params,
        };
        config.validate()?;
        Ok(config)
    }

    /// Class names end up in a selector list, so they must be CSS
    /// identifiers that need no escaping.
    fn validate(&self) -> Result<()> {
        for class in [&self.active_class, &self.ancestor_class] {
            if !is_css_identifier(class) {
                return Err(Error::ClassName(class.clone()));
            }
        }
        Ok(())
    }

    pub fn active_class(&self) -> &str {
        &self.active_class
    }

    pub fn ancestor_class(&self) -> &str {
        &self.ancestor_class
    }

    pub fn ignored_params(&self) -> &BTreeSet<String> {
        &self.ignored_params
    }

    pub fn is_ignored(&self, param: &str) -> bool {
        self.ignored_params.contains(param)
    }

    /// Both class names, active first.
    pub fn classes(&self) -> [&str; 2] {
        [&self.active_class, &self.ancestor_class]
    }

    /// Selector list matching every element carrying either class.
    pub fn clear_selector(&self) -> String {
        format!(".{}, .{}", self.active_class, self.ancestor_class)
    }
}

/// `-?[A-Za-z_\u{80}-][A-Za-z0-9_\u{80}-]*` without the `--` custom
/// property form.
fn is_css_identifier(s: &str) -> bool {
    let name_start = |c: char| c.is_ascii_alphabetic() || c == '_' || !c.is_ascii();
    let name = |c: char| name_start(c) || c.is_ascii_digit() || c == '-';

    let rest = s.strip_prefix('-').unwrap_or(s);
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if name_start(c) => chars.all(name),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.classes(), ["is-active", "is-ancestor"]);
        assert!(config.is_ignored("gclid"));
        assert!(!config.is_ignored("page"));
        assert_eq!(config.clear_selector(), ".is-active, .is-ancestor");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(r#"active_class = "current""#).unwrap();
        assert_eq!(config.active_class(), "current");
        assert_eq!(config.ancestor_class(), "is-ancestor");
        assert_eq!(config.ignored_params().len(), IGNORED_PARAMS.len());
    }

    #[test]
    fn toml_replaces_ignored_set() {
        let config = Config::from_toml_str(r#"ignored_params = ["session"]"#).unwrap();
        assert!(config.is_ignored("session"));
        assert!(!config.is_ignored("utm_source"));
    }

    #[test]
    fn rejects_bad_class_names() {
        assert!(matches!(
            Config::from_toml_str(r#"active_class = "a b""#),
            Err(Error::ClassName(_))
        ));
        assert!(matches!(
            Config::from_toml_str(r#"ancestor_class = """#),
            Err(Error::ClassName(_))
        ));
        assert!(matches!(
            Config::from_toml_str("colour = 1"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn class_names_must_be_identifiers() {
        for bad in ["1st", "-2", "a>b", "a+b", "a~b", "--x", "-", "a*", "a\\b", "x{y}"] {
            let result = Config::new(bad, "open", IGNORED_PARAMS.iter().copied());
            assert!(
                matches!(&result, Err(Error::ClassName(c)) if c == bad),
                "{bad} accepted"
            );
        }
        for good in ["current", "-moz-open", "_x", "nav-link2", "été"] {
            assert!(Config::new("current", good, ["ref"]).is_ok(), "{good} rejected");
        }
    }

    #[test]
    fn new_validates() -> Result<()> {
        let config = Config::new("current", "open", ["session"])?;
        assert_eq!(config.classes(), ["current", "open"]);
        assert!(config.is_ignored("session"));
        assert!(!config.is_ignored("utm_source"));

        assert!(matches!(
            Config::new("current", "a b", ["session"]),
            Err(Error::ClassName(_))
        ));
        Ok(())
    }
}
