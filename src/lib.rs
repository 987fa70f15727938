mod config;
pub use config::{Config, ACTIVE_CLASS, ANCESTOR_CLASS, IGNORED_PARAMS};

mod error;
pub use error::{Error, Result};

mod uri;
pub use uri::{normalize, strip_trailing_slash, Normalizer};

mod link;
pub use link::CandidateLink;

mod document;
pub use document::{LinkDocument, ReadyState};

mod matcher;
pub use matcher::{apply_active_state, Match, Matcher};

mod page;
pub use page::StaticDocument;

mod observer;
pub use observer::{
    ActiveLinks, Navigation, NavigationCallback, NavigationHub, NavigationSource, Scheduler, Task,
    TaskQueue,
};

#[cfg(feature = "wasm")]
pub mod wasm;

#[cfg(test)]
pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("active_links=debug")),
        )
        .with_test_writer()
        .try_init();
}
