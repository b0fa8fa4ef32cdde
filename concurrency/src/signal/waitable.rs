//! The waitable abstraction shared by every primitive in this crate.
//!
//! A [`Done`] is a cheap, clonable handle to the completion marker of one *generation* of a
//! primitive. Each generation owns its own watch channel, so a waiter that obtained a [`Done`]
//! before a reset keeps observing the generation it started on and is never woken by a later
//! one. Anything that can hand out a [`Done`] implements [`Waitable`], which lets consumers
//! multiplex waits over several primitives inside a single `tokio::select!`.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::concurrency_error;
use crate::error::{ConcurrencyError, ConcurrencyResult, ErrorKind};

/// Completion marker of a single generation.
///
/// The watch value flips from `false` to `true` exactly once and never flips back.
#[derive(Debug)]
pub(crate) struct Generation {
    tx: watch::Sender<bool>,
    /// Task that fires this generation later, aborted once the generation is dropped.
    timer: OnceLock<AbortHandle>,
}

impl Generation {
    pub(crate) fn pending() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx,
            timer: OnceLock::new(),
        }
    }

    pub(crate) fn triggered() -> Self {
        let (tx, _) = watch::channel(true);
        Self {
            tx,
            timer: OnceLock::new(),
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        *self.tx.borrow()
    }

    /// Fires the marker, returning whether this call performed the transition.
    pub(crate) fn fire(&self) -> bool {
        self.tx.send_if_modified(|done| {
            if *done {
                false
            } else {
                *done = true;
                true
            }
        })
    }

    pub(crate) async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|done| *done).await;
    }
}

impl Drop for Generation {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get() {
            timer.abort();
        }
    }
}

/// Handle to the completion of one generation of a primitive.
#[derive(Debug, Clone)]
pub struct Done {
    generation: Arc<Generation>,
}

impl Done {
    pub(crate) fn from_generation(generation: Arc<Generation>) -> Self {
        Self { generation }
    }

    /// Returns a handle that is already complete.
    pub fn completed() -> Self {
        Self::from_generation(Arc::new(Generation::triggered()))
    }

    /// Returns a handle that never completes.
    ///
    /// Useful as the cancellation condition of a wait that should not be cancellable.
    pub fn never() -> Self {
        Self::from_generation(Arc::new(Generation::pending()))
    }

    /// Returns `true` once the generation behind this handle has completed.
    pub fn is_done(&self) -> bool {
        self.generation.is_done()
    }

    /// Waits until the generation behind this handle completes.
    pub async fn wait(&self) {
        self.generation.wait().await
    }

    /// Returns `true` if both handles refer to the same generation.
    pub fn same_generation(&self, other: &Done) -> bool {
        Arc::ptr_eq(&self.generation, &other.generation)
    }

    pub(crate) fn fire(&self) -> bool {
        self.generation.fire()
    }
}

/// Something whose completion can be awaited through a [`Done`] handle.
pub trait Waitable {
    /// Returns the handle of the current generation.
    fn done(&self) -> Done;

    /// Returns the error reported by waits that were aborted by this condition.
    fn cancellation_error(&self) -> ConcurrencyError {
        concurrency_error!(ErrorKind::Cancelled, "Wait cancelled")
    }
}

/// A [`Waitable`] that also carries an error fixed at completion time.
pub trait ErrorWaitable: Waitable {
    /// Returns the stored error and whether the current generation has completed.
    fn error(&self) -> (Option<ConcurrencyError>, bool);
}

impl Waitable for Done {
    fn done(&self) -> Done {
        self.clone()
    }
}

impl<W: Waitable + ?Sized> Waitable for &W {
    fn done(&self) -> Done {
        (**self).done()
    }

    fn cancellation_error(&self) -> ConcurrencyError {
        (**self).cancellation_error()
    }
}

impl<W: Waitable + ?Sized> Waitable for Arc<W> {
    fn done(&self) -> Done {
        (**self).done()
    }

    fn cancellation_error(&self) -> ConcurrencyError {
        (**self).cancellation_error()
    }
}

/// Returns a handle that completes once `duration` has elapsed.
///
/// The timer runs on the current tokio runtime and is cancelled as soon as every clone of the
/// returned handle has been dropped.
pub fn timeout_after(duration: Duration) -> ConcurrencyResult<Done> {
    let Ok(handle) = Handle::try_current() else {
        return Err(concurrency_error!(
            ErrorKind::NoRuntime,
            "Timeout requires a tokio runtime"
        ));
    };

    let generation = Arc::new(Generation::pending());
    let fired = Arc::downgrade(&generation);
    let timer = handle.spawn(async move {
        tokio::time::sleep(duration).await;
        if let Some(generation) = fired.upgrade() {
            generation.fire();
        }
    });
    let _ = generation.timer.set(timer.abort_handle());

    Ok(Done::from_generation(generation))
}

/// Waits for `waitable` for at most `duration`, returning whether it completed.
pub async fn wait_with_timeout<W>(waitable: &W, duration: Duration) -> bool
where
    W: Waitable + ?Sized,
{
    let done = waitable.done();
    tokio::time::timeout(duration, done.wait()).await.is_ok()
}

/// Waits for `waitable` for at most `duration`.
///
/// Fails with [`ErrorKind::Timeout`] if the duration elapses first.
pub async fn wait_or_timeout<W>(waitable: &W, duration: Duration) -> ConcurrencyResult<()>
where
    W: Waitable + ?Sized,
{
    let done = waitable.done();
    tokio::time::timeout(duration, done.wait()).await?;

    Ok(())
}

/// Waits for `waitable` unless `cancel` completes first.
///
/// When both are complete the primary condition wins. A cancelled wait fails with the
/// cancel condition's [`Waitable::cancellation_error`].
pub async fn wait_with_cancel<W, C>(waitable: &W, cancel: &C) -> ConcurrencyResult<()>
where
    W: Waitable + ?Sized,
    C: Waitable + ?Sized,
{
    let done = waitable.done();
    let cancel_done = cancel.done();

    tokio::select! {
        biased;
        _ = done.wait() => Ok(()),
        _ = cancel_done.wait() => Err(cancel.cancellation_error()),
    }
}

/// Waits for an [`ErrorWaitable`] and returns the error it completed with.
pub async fn wait_for_error<W, C>(
    waitable: &W,
    cancel: &C,
) -> ConcurrencyResult<Option<ConcurrencyError>>
where
    W: ErrorWaitable + ?Sized,
    C: Waitable + ?Sized,
{
    wait_with_cancel(waitable, cancel).await?;
    Ok(waitable.error().0)
}
