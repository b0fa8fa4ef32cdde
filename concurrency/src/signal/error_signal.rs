use std::sync::{Arc, OnceLock};
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::error::ConcurrencyError;
use crate::signal::waitable::{Done, ErrorWaitable, Generation, Waitable};

/// One generation of an [`ErrorSignal`].
///
/// The error slot is written exactly once, immediately before the marker fires, which makes
/// the error visible to every reader that observes the generation as done.
#[derive(Debug)]
struct ErrorGeneration {
    marker: Arc<Generation>,
    error: OnceLock<Option<ConcurrencyError>>,
}

impl ErrorGeneration {
    fn pending() -> Self {
        Self {
            marker: Arc::new(Generation::pending()),
            error: OnceLock::new(),
        }
    }

    fn stored_error(&self) -> Option<ConcurrencyError> {
        self.error.get().cloned().flatten()
    }
}

/// A [`crate::signal::Signal`] that carries an error fixed at the moment it is triggered.
///
/// The first caller to trigger a generation decides its error. Later callers return `false`
/// and their error is discarded. The stored error is immutable until [`ErrorSignal::reset`].
#[derive(Debug)]
pub struct ErrorSignal {
    current: ArcSwap<ErrorGeneration>,
}

impl ErrorSignal {
    /// Creates a new pending error signal.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(ErrorGeneration::pending()),
        }
    }

    /// Triggers the current generation without an error.
    pub fn signal(&self) -> bool {
        self.trigger(None)
    }

    /// Triggers the current generation, storing `err` as its error.
    pub fn signal_with_error(&self, err: ConcurrencyError) -> bool {
        self.trigger(Some(err))
    }

    /// Triggers the current generation with an optional error.
    ///
    /// Whichever call fills the error slot returns `true`. Every call has the generation
    /// done by the time it returns, whether it won or not.
    pub fn trigger(&self, err: Option<ConcurrencyError>) -> bool {
        let generation = self.current.load_full();
        let won = generation.error.set(err).is_ok();
        // The slot is filled either way, so a loser may fire the marker on the winner's behalf.
        generation.marker.fire();

        won
    }

    /// Starts a new generation if the current one is triggered, clearing the error.
    pub fn reset(&self) -> bool {
        let current = self.current.load_full();
        if !current.marker.is_done() {
            return false;
        }

        let previous = self
            .current
            .compare_and_swap(&current, Arc::new(ErrorGeneration::pending()));

        Arc::ptr_eq(&*previous, &current)
    }

    /// Returns `true` if the current generation has been triggered.
    pub fn is_done(&self) -> bool {
        self.current.load().marker.is_done()
    }

    /// Waits until the current generation is triggered and returns its error.
    pub async fn wait(&self) -> Option<ConcurrencyError> {
        let generation = self.current.load_full();
        generation.marker.wait().await;
        generation.stored_error()
    }

    /// Waits for at most `duration`, returning whether the signal was triggered.
    pub async fn wait_with_timeout(&self, duration: Duration) -> bool {
        crate::signal::wait_with_timeout(self, duration).await
    }
}

impl Default for ErrorSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl Waitable for ErrorSignal {
    fn done(&self) -> Done {
        Done::from_generation(self.current.load().marker.clone())
    }

    /// A wait cancelled by an error signal reports the stored error, if there is one.
    fn cancellation_error(&self) -> ConcurrencyError {
        match self.error() {
            (Some(err), _) => err,
            (None, _) => crate::concurrency_error!(
                crate::error::ErrorKind::Cancelled,
                "Wait cancelled"
            ),
        }
    }
}

impl ErrorWaitable for ErrorSignal {
    fn error(&self) -> (Option<ConcurrencyError>, bool) {
        let generation = self.current.load();
        if !generation.marker.is_done() {
            return (None, false);
        }

        (generation.stored_error(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency_error;
    use crate::error::ErrorKind;
    use crate::signal::{wait_for_error, wait_with_cancel};

    #[test]
    fn test_error_before_trigger() {
        let signal = ErrorSignal::new();
        let (err, done) = signal.error();
        assert!(err.is_none());
        assert!(!done);
    }

    #[test]
    fn test_first_error_wins() {
        let signal = ErrorSignal::new();
        let first = concurrency_error!(ErrorKind::Application, "first");
        let second = concurrency_error!(ErrorKind::Application, "second");

        assert!(signal.signal_with_error(first.clone()));
        assert!(!signal.signal_with_error(second));
        assert!(!signal.signal());

        let (err, done) = signal.error();
        assert!(done);
        let err = err.unwrap();
        assert!(err.same_instance(&first));
    }

    #[test]
    fn test_concurrent_triggers_leave_signal_done() {
        for _ in 0..100 {
            let signal = ErrorSignal::new();
            let barrier = std::sync::Barrier::new(8);
            let winners = std::sync::atomic::AtomicUsize::new(0);

            std::thread::scope(|scope| {
                for i in 0..8 {
                    let (signal, barrier, winners) = (&signal, &barrier, &winners);
                    scope.spawn(move || {
                        barrier.wait();
                        let err = concurrency_error!(ErrorKind::Application, "boom", i);
                        if signal.signal_with_error(err) {
                            winners.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        }

                        assert!(signal.is_done());
                        let (err, done) = signal.error();
                        assert!(done);
                        assert!(err.is_some());
                    });
                }
            });

            assert_eq!(winners.load(std::sync::atomic::Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_signal_without_error() {
        let signal = ErrorSignal::new();
        assert!(signal.signal());
        assert_eq!(signal.error(), (None, true));
    }

    #[test]
    fn test_reset_clears_error() {
        let signal = ErrorSignal::new();
        assert!(!signal.reset());

        signal.signal_with_error(concurrency_error!(ErrorKind::Application, "boom"));
        assert!(signal.reset());
        assert!(!signal.is_done());
        assert_eq!(signal.error(), (None, false));

        assert!(signal.signal());
        assert_eq!(signal.error(), (None, true));
    }

    #[tokio::test]
    async fn test_wait_returns_stored_error() {
        let signal = Arc::new(ErrorSignal::new());
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };

        tokio::task::yield_now().await;
        signal.signal_with_error(concurrency_error!(ErrorKind::Application, "boom"));

        let err = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(err.description(), "boom");
    }

    #[tokio::test]
    async fn test_cancellation_propagates_stored_error() {
        let cancel = ErrorSignal::new();
        cancel.signal_with_error(concurrency_error!(ErrorKind::Application, "shutdown"));

        let err = wait_with_cancel(&Done::never(), &cancel).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Application);
        assert_eq!(err.description(), "shutdown");
    }

    #[tokio::test]
    async fn test_wait_for_error() {
        let signal = ErrorSignal::new();
        signal.signal_with_error(concurrency_error!(ErrorKind::Application, "payload"));

        let err = wait_for_error(&signal, &Done::never()).await.unwrap();
        assert_eq!(err.unwrap().description(), "payload");
    }
}
