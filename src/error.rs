/// Errors surfaced by the fallible entry points of this crate.
///
/// The matching pass itself never returns these: URL failures fall back to
/// the raw input and broken links are skipped.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid class name {0:?}")]
    ClassName(String),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("unknown navigation kind {0:?}")]
    UnknownNavigation(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
