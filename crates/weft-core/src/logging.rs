#![forbid(unsafe_code)]

//! Subscriber installation for hosts embedding the runtime.
//!
//! The crates only emit `tracing` events; picking a subscriber is left to the
//! host process. [`init`] is a convenience for servers and tests that want the
//! usual `RUST_LOG`-style filtering. With the `tracing-json` feature enabled
//! the records are written as JSON lines.

use tracing_subscriber::EnvFilter;

/// Environment variable consulted for the log filter before `RUST_LOG`.
pub const LOG_FILTER_ENV: &str = "WEFT_LOG";

/// Default directive when neither [`LOG_FILTER_ENV`] nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "info";

fn filter() -> EnvFilter {
    std::env::var(LOG_FILTER_ENV)
        .ok()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a global subscriber writing to stderr.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init() -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(std::io::stderr);

    #[cfg(feature = "tracing-json")]
    let result = builder.json().try_init();
    #[cfg(not(feature = "tracing-json"))]
    let result = builder.try_init();

    result.is_ok()
}
