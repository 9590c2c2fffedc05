//! Tracing subscriber setup for hosts embedding the controller.
use std::env;

use tracing_subscriber::EnvFilter;

use crate::config::Context;

/// Filter directive used when neither the context nor `RUST_LOG` sets one.
const DEFAULT_DIRECTIVE: &str = "info";

/// Builds the filter for `level`, else `RUST_LOG`, else `info`.
///
/// `level` accepts any `EnvFilter` directive, e.g. `debug` or
/// `keepup=trace,warn`. Directives that fail to parse fall back to the next
/// source.
pub fn env_filter(level: Option<&str>) -> EnvFilter {
    level
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| {
            env::var(EnvFilter::DEFAULT_ENV)
                .ok()
                .and_then(|directive| EnvFilter::try_new(directive).ok())
        })
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Installs a `fmt` subscriber filtered by the context's `log_level`.
///
/// A subscriber that is already installed is left in place.
pub fn init_logging(context: &Context) {
    let filter = env_filter(context.log_level.as_deref());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
