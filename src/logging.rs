//! Tracing setup for the wrapper.
//!
//! tidycache's stdout and stderr are a verbatim relay of the wrapped tool's
//! streams, so our own diagnostics default to WARN and always go to stderr.

/// Initialize the global tracing subscriber.
///
/// The filter is taken from environment variables in priority order:
/// `TIDYCACHE_LOG` first, then `RUST_LOG`, then a hard-coded `warn` default
/// that keeps the wrapper silent on the happy path.
pub(crate) fn init() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_env("TIDYCACHE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Initialize tracing for tests with sensible defaults.
///
/// Uses [`std::sync::OnceLock`] so logging is initialized only once per test
/// process, and `test_writer()` so output is captured by the test harness and
/// shown only for failing tests.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    use std::sync::OnceLock;
    use tracing_subscriber::{EnvFilter, fmt};

    static INIT: OnceLock<()> = OnceLock::new();

    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_env("TIDYCACHE_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("debug"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_level(true)
            .init();
    });
}
