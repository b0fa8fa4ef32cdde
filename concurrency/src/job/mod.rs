//! Conflict-aware job scheduling.
//!
//! [`JobProcessor`] keeps submitted jobs in a live dependency graph. Edges are derived from a
//! caller-supplied predicate at submission time, which yields first-submitted-first-run
//! ordering between conflicting jobs and free parallelism between all others.

mod dag;
mod processor;

pub use processor::JobProcessor;
