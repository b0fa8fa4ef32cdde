//! Coordination primitives for tokio services.
//!
//! The crate provides resettable one-shot events ([`signal`]), a lock-free broadcast sequence
//! with strict and skipping observers ([`stream`]), mutual exclusion over overlapping key
//! sets ([`fence`]) and a scheduler that runs jobs concurrently while keeping conflicting
//! ones apart ([`job`]). Every blocking operation resolves to a [`signal::Done`] handle, so
//! waits on different primitives can be multiplexed in one `tokio::select!`.

pub mod config;
pub mod error;
pub mod fence;
pub mod job;
mod macros;
pub mod signal;
pub mod stream;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
