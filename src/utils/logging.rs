//! Logging setup
//!
//! `RUST_LOG` wins when it holds a valid filter; otherwise the configured
//! `logging.level` is used. Both accept full `EnvFilter` directives such as
//! `subcast=debug,info`, not just a bare level.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Install the global fmt subscriber.
///
/// Uses `try_init`, so later calls (tests, embedders that already set a
/// subscriber) are ignored.
pub fn init(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .with_target(false)
        .try_init();
}

pub(crate) fn filter(default_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    EnvFilter::try_new(default_level).unwrap_or_else(|e| {
        eprintln!("invalid log filter {default_level:?} ({e}), using info");
        EnvFilter::default().add_directive(LevelFilter::INFO.into())
    })
}
