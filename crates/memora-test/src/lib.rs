//! Helpers for testing memora caches.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all
//!    console output is captured by the test runner.
//!
//!  - When using [`tempdir`], make sure that the handle to the temp directory
//!    is held for the entire lifetime of the test. When dropped too early,
//!    entries written afterwards silently leak outside the test sandbox. To
//!    avoid this, assign it to a variable in the test function (e.g.
//!    `let _cache_dir = memora_test::tempdir()`).

#![warn(missing_docs)]

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

pub use tempfile::TempDir;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from `memora` and mutes
///    all other logs.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("memora=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Creates a temporary directory.
///
/// The directory is deleted when the [`TempDir`] instance is dropped. Use it
/// as a guard to automatically clean up after tests.
pub fn tempdir() -> TempDir {
    TempDir::new().unwrap()
}
