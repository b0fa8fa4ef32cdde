//! Exclusion over abstract sets of byte-string keys.
//!
//! A [`KeySet`] describes which keys an operation touches. A [`KeyFence`] admits an operation
//! only once its key set collides with no key set already held, so operations over disjoint
//! parts of a key space run concurrently while overlapping ones are serialized.

mod key_fence;
mod key_set;

pub use key_fence::{KeyFence, KeyFenceGuard};
pub use key_set::KeySet;
