//! Tracing bootstrap for the demo.

use std::env;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,aptrack=debug,session_watch=debug";

/// Installs the global subscriber.
///
/// Precedence:
/// 1) `RUST_LOG`
/// 2) `APTRACK_LOG`
/// 3) internal default filter
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(filter_from_env())
        .try_init();
}

fn filter_from_env() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let custom = env::var("APTRACK_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok());
    custom.unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
