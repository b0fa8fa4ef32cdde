//! One-shot triggerable events.
//!
//! This module provides the event family every other primitive builds on:
//!
//! - [`Signal`] - a resettable event triggered at most once per generation
//! - [`ErrorSignal`] - a [`Signal`] carrying an error fixed at trigger time
//! - [`WaitGroup`] - a counter that is satisfied whenever it is less than or equal to zero
//! - [`Stopper`] - a stop-request/stopped handshake for background loops
//!
//! All of them hand out [`Done`] handles through the [`Waitable`] trait. A handle belongs to
//! a single generation and must be re-fetched after a reset.

mod base;
mod error_signal;
mod stopper;
mod wait_group;
pub(crate) mod waitable;

pub use base::Signal;
pub use error_signal::ErrorSignal;
pub use stopper::Stopper;
pub use wait_group::WaitGroup;
pub use waitable::{
    Done, ErrorWaitable, Waitable, timeout_after, wait_for_error, wait_or_timeout,
    wait_with_cancel, wait_with_timeout,
};
