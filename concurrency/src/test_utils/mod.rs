//! Helpers shared by unit and integration tests.

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tokio::time::timeout;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::signal::{Done, Waitable};

/// Default timeout for test waits.
///
/// Chosen so that a coordination bug fails the test quickly instead of hanging CI, while
/// staying well above what any correct wait in the suite takes.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

static INIT_TRACING: Once = Once::new();

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, once per process.
pub fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "concurrency=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

/// Awaits `future`, panicking if it does not complete within [`DEFAULT_WAIT_TIMEOUT`].
pub async fn within<F>(future: F) -> F::Output
where
    F: Future,
{
    within_timeout(DEFAULT_WAIT_TIMEOUT, future).await
}

/// Awaits `future`, panicking if it does not complete within `duration`.
pub async fn within_timeout<F>(duration: Duration, future: F) -> F::Output
where
    F: Future,
{
    match timeout(duration, future).await {
        Ok(output) => output,
        Err(_) => panic!(
            "Test future timed out after {duration:?}. \
             This likely indicates that the awaited condition is never reached."
        ),
    }
}

/// A [`Done`] handle whose waits fail the test instead of hanging.
#[derive(Debug, Clone)]
pub struct TimedDone {
    done: Done,
    timeout_duration: Duration,
}

impl TimedDone {
    /// Creates a new [`TimedDone`] for `waitable` with the default timeout.
    pub fn new<W: Waitable + ?Sized>(waitable: &W) -> Self {
        Self::with_timeout(waitable, DEFAULT_WAIT_TIMEOUT)
    }

    /// Creates a new [`TimedDone`] for `waitable` with a custom timeout.
    pub fn with_timeout<W: Waitable + ?Sized>(waitable: &W, timeout_duration: Duration) -> Self {
        Self {
            done: waitable.done(),
            timeout_duration,
        }
    }

    /// Waits for completion.
    ///
    /// # Panics
    ///
    /// Panics if the timeout elapses before the handle completes.
    pub async fn wait(&self) {
        within_timeout(self.timeout_duration, self.done.wait()).await
    }

    /// Waits for completion, returning `false` on timeout instead of panicking.
    pub async fn try_wait(&self) -> bool {
        timeout(self.timeout_duration, self.done.wait())
            .await
            .is_ok()
    }

    /// Asserts that the handle stays pending for the whole timeout.
    ///
    /// # Panics
    ///
    /// Panics if the handle completes before the timeout elapses.
    pub async fn assert_pending(&self) {
        assert!(
            !self.try_wait().await,
            "Expected the handle to stay pending for {:?}",
            self.timeout_duration
        );
    }
}
