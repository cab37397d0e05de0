//! Test utilities for catalog-sync
//!
//! Shared by unit tests and, through the `test-utils` feature, by the
//! integration test target.
//!
//! - [`init_test_logging`] - one-time tracing setup honouring `RUST_LOG`
//! - [`CatalogFixture`] / [`ConfigFixture`] - sample catalog and config files
//! - [`TestEnvironment`] - a temporary directory holding both

pub mod environment;
pub mod fixtures;

pub use environment::TestEnvironment;
pub use fixtures::{CatalogFixture, ConfigFixture};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`. Without either, tests run
/// silently. Safe to call from every test.
///
/// ```bash
/// RUST_LOG=watcher=trace cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
