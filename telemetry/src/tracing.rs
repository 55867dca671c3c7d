//! Tracing subscriber setup.
//!
//! Binaries call [`init_tracing`] once at startup; tests call
//! [`init_test_tracing`], which is safe to invoke from every test function.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Default directive applied when `RUST_LOG` is not set.
const DEFAULT_LOG_DIRECTIVE: &str = "info";

static TEST_TRACING: Once = Once::new();

/// Initializes the global tracing subscriber for a binary.
///
/// Filtering is controlled through `RUST_LOG`, falling back to `info` when the
/// variable is absent. Panics if a global subscriber is already installed.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .init();
}

/// Initializes tracing for tests.
///
/// Installs a compact subscriber at most once per process, so every test can
/// call this without coordinating with the others.
pub fn init_test_tracing() {
    TEST_TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_test_writer()
            .compact()
            .init();
    });
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE))
}
