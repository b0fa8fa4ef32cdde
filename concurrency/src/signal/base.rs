use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::signal::waitable::{Done, Generation, Waitable};

/// A resettable event that can be triggered at most once per generation.
///
/// A [`Signal`] starts out pending. [`Signal::signal`] triggers the current generation and
/// [`Signal::reset`] starts a new one, each only from the opposite state. Concurrent callers
/// race for every transition and exactly one of them observes `true`.
///
/// The current generation lives in an [`ArcSwap`], so none of the operations take a lock.
#[derive(Debug)]
pub struct Signal {
    current: ArcSwap<Generation>,
}

impl Signal {
    /// Creates a new pending signal.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Generation::pending()),
        }
    }

    /// Creates a signal that is already triggered.
    pub fn triggered() -> Self {
        Self {
            current: ArcSwap::from_pointee(Generation::triggered()),
        }
    }

    /// Triggers the current generation.
    ///
    /// Returns whether this call performed the transition.
    pub fn signal(&self) -> bool {
        self.current.load().fire()
    }

    /// Starts a new generation if the current one is triggered.
    ///
    /// Returns whether this call performed the transition.
    pub fn reset(&self) -> bool {
        let current = self.current.load_full();
        if !current.is_done() {
            return false;
        }

        let previous = self
            .current
            .compare_and_swap(&current, Arc::new(Generation::pending()));

        Arc::ptr_eq(&*previous, &current)
    }

    /// Returns `true` if the current generation has been triggered.
    pub fn is_done(&self) -> bool {
        self.current.load().is_done()
    }

    /// Waits until the generation current at call time is triggered.
    pub async fn wait(&self) {
        self.done().wait().await
    }

    /// Waits for at most `duration`, returning whether the signal was triggered.
    pub async fn wait_with_timeout(&self, duration: Duration) -> bool {
        crate::signal::wait_with_timeout(self, duration).await
    }

    /// Triggers this signal once `trigger` completes.
    ///
    /// Returns `false` without signaling if `cancel` completes first, or if this signal is
    /// triggered by another party while waiting.
    pub async fn signal_when<T, C>(&self, trigger: &T, cancel: &C) -> bool
    where
        T: Waitable + ?Sized,
        C: Waitable + ?Sized,
    {
        let own = self.done();
        let trigger = trigger.done();
        let cancel = cancel.done();

        tokio::select! {
            biased;
            _ = own.wait() => false,
            _ = cancel.wait() => false,
            _ = trigger.wait() => own.fire(),
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Waitable for Signal {
    fn done(&self) -> Done {
        Done::from_generation(self.current.load_full())
    }
}
