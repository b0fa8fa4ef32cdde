use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::ConcurrencyResult;
use crate::fence::KeySet;
use crate::signal::Waitable;

#[derive(Debug)]
struct KeyFenceInner {
    /// Key sets currently registered as held, in acquisition order.
    held: Mutex<Vec<KeySet>>,
    /// Bumped on every release. Blocked lockers wait for it to change and then re-check.
    released: watch::Sender<u64>,
}

/// Mutual exclusion over possibly-overlapping key sets.
///
/// [`KeyFence::lock`] waits until the requested [`KeySet`] collides with no held key set and
/// then registers it. Non-colliding acquisitions proceed concurrently and in no particular
/// order.
///
/// Wake-ups are coarse: every release wakes every blocked locker, which then re-checks for
/// collisions itself. A locker may therefore wake up for a release that never concerned it.
/// This keeps the bookkeeping to one list and one counter at the cost of spurious retries
/// under heavy contention.
///
/// The fence is cheap to clone; clones share the same held set.
#[derive(Debug, Clone)]
pub struct KeyFence {
    inner: Arc<KeyFenceInner>,
}

impl KeyFence {
    /// Creates a fence with nothing held.
    pub fn new() -> Self {
        let (released, _) = watch::channel(0);

        Self {
            inner: Arc::new(KeyFenceInner {
                held: Mutex::new(Vec::new()),
                released,
            }),
        }
    }

    /// Registers `keys` if nothing held collides with it, otherwise returns a receiver that
    /// changes on the next release.
    fn try_register(&self, keys: &KeySet) -> Result<(), watch::Receiver<u64>> {
        let mut held = self.inner.held.lock();
        if !held.iter().any(|other| other.collides(keys)) {
            held.push(keys.clone());
            return Ok(());
        }

        // Subscribing while the held list is locked means no release can slip in between the
        // collision check and the wait.
        Err(self.inner.released.subscribe())
    }

    /// Waits until `keys` collides with no held key set, then registers it as held.
    pub async fn lock(&self, keys: &KeySet) {
        loop {
            let mut released = match self.try_register(keys) {
                Ok(()) => return,
                Err(released) => released,
            };

            debug!(?keys, "key fence contended, waiting for a release");
            // The sender lives in `self`, so the channel cannot close while we wait.
            let _ = released.changed().await;
        }
    }

    /// Registers `keys` without waiting, returning whether it was registered.
    pub fn try_lock(&self, keys: &KeySet) -> bool {
        self.try_register(keys).is_ok()
    }

    /// Like [`KeyFence::lock`], but gives up after `duration`.
    ///
    /// Returns whether `keys` was registered.
    pub async fn lock_with_timeout(&self, keys: &KeySet, duration: Duration) -> bool {
        tokio::time::timeout(duration, self.lock(keys)).await.is_ok()
    }

    /// Like [`KeyFence::lock_with_timeout`], but fails with [`ErrorKind::Timeout`] instead of
    /// returning `false`.
    ///
    /// [`ErrorKind::Timeout`]: crate::error::ErrorKind::Timeout
    pub async fn lock_or_timeout(
        &self,
        keys: &KeySet,
        duration: Duration,
    ) -> ConcurrencyResult<()> {
        tokio::time::timeout(duration, self.lock(keys)).await?;

        Ok(())
    }

    /// Like [`KeyFence::lock`], but gives up once `cancel` completes.
    ///
    /// A cancelled attempt registers nothing and fails with the cancel condition's
    /// cancellation error.
    pub async fn lock_with_cancel<C>(&self, keys: &KeySet, cancel: &C) -> ConcurrencyResult<()>
    where
        C: Waitable + ?Sized,
    {
        let cancel_done = cancel.done();

        tokio::select! {
            biased;
            _ = self.lock(keys) => Ok(()),
            _ = cancel_done.wait() => Err(cancel.cancellation_error()),
        }
    }

    /// Releases the first held registration equal to `keys`.
    ///
    /// Returns `false` if no such registration was held.
    pub fn unlock(&self, keys: &KeySet) -> bool {
        let mut held = self.inner.held.lock();
        let Some(position) = held.iter().position(|other| other == keys) else {
            warn!(?keys, "attempted to unlock a key set that is not held");
            return false;
        };

        held.remove(position);
        self.inner.released.send_modify(|count| *count = count.wrapping_add(1));

        true
    }

    /// Waits for `keys` and returns a guard that releases it when dropped.
    pub async fn acquire(&self, keys: KeySet) -> KeyFenceGuard {
        self.lock(&keys).await;

        KeyFenceGuard {
            fence: self.clone(),
            keys,
        }
    }

    /// Runs `f` while holding `keys`.
    ///
    /// The key set is released when `f` returns or unwinds.
    pub async fn do_with_lock<F, R>(&self, keys: KeySet, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = self.acquire(keys).await;
        f()
    }

    /// Runs the future produced by `f` while holding `keys` and returns its result.
    ///
    /// The key set is released before the result is handed back, including when the future
    /// fails, panics, or is dropped before completion.
    pub async fn do_status_with_lock<F, Fut, T, E>(&self, keys: KeySet, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let guard = self.acquire(keys).await;
        let result = f().await;
        drop(guard);

        result
    }

    /// Returns the number of key sets currently held.
    pub fn held_count(&self) -> usize {
        self.inner.held.lock().len()
    }
}

impl Default for KeyFence {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds a [`KeySet`] registered with a [`KeyFence`] and releases it on drop.
#[derive(Debug)]
#[must_use = "the key set is released as soon as the guard is dropped"]
pub struct KeyFenceGuard {
    fence: KeyFence,
    keys: KeySet,
}

impl KeyFenceGuard {
    pub fn keys(&self) -> &KeySet {
        &self.keys
    }
}

impl Drop for KeyFenceGuard {
    fn drop(&mut self) {
        self.fence.unlock(&self.keys);
    }
}
