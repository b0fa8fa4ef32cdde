use tracing::debug;

use crate::error::ConcurrencyError;
use crate::signal::error_signal::ErrorSignal;
use crate::signal::waitable::{Done, ErrorWaitable, Waitable};

/// Stop handshake between a controlling party and a background loop.
///
/// The controller requests a stop with [`Stopper::stop`] and waits on [`Stopper::stopped`].
/// The loop watches [`Stopper::stop_requested`], may abort on its own with
/// [`Stopper::stop_with_error`], and calls [`Stopper::report_stopped`] once it has exited.
/// The stopped signal carries whatever error the stop was requested with.
#[derive(Debug, Default)]
pub struct Stopper {
    stop_requested: ErrorSignal,
    stopped: ErrorSignal,
}

impl Stopper {
    /// Creates a stopper with no stop requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the loop to stop. Returns whether this call made the request.
    pub fn stop(&self) -> bool {
        self.stop_requested.signal()
    }

    /// Requests the loop to stop because of `err`.
    pub fn stop_with_error(&self, err: ConcurrencyError) -> bool {
        self.stop_requested.signal_with_error(err)
    }

    /// Handle that completes once a stop has been requested.
    pub fn stop_requested(&self) -> Done {
        self.stop_requested.done()
    }

    /// Returns `true` once a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.is_done()
    }

    /// Marks the loop as stopped, carrying the stop request's error, if any.
    pub fn report_stopped(&self) -> bool {
        let (err, _) = self.stop_requested.error();
        debug!(with_error = err.is_some(), "stopper reported stopped");

        self.stopped.trigger(err)
    }

    /// Signal that completes once the loop has reported that it stopped.
    pub fn stopped(&self) -> &ErrorSignal {
        &self.stopped
    }

    /// Withdraws an earlier stop request so the loop can keep running.
    pub fn reset_stop_request(&self) -> bool {
        self.stop_requested.reset()
    }
}
