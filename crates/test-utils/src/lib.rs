//! Shared fixtures for the `neuroflow` integration tests.
//!
//! - [`builders`]: temporary datasets and file helpers.
//! - [`recording`]: callback actions that record what they were given.

pub mod builders;
pub mod recording;

use std::future::Future;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// Upper bound for anything that spawns a real process.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Install a per-test subscriber.
///
/// Output goes through the test writer, so it only shows up for failing
/// tests. Set `NEUROFLOW_LOG=debug` to see command argv and stdout lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("NEUROFLOW_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    // Several tests in one binary race to install it; the first one wins.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(true)
        .try_init();
}

/// Await `f`, panicking after [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_TIMEOUT, f).await {
        Ok(value) => value,
        Err(_) => panic!("test did not finish within {TEST_TIMEOUT:?}"),
    }
}
