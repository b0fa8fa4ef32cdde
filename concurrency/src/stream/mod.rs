//! Broadcast of an evolving value to independent observers.
//!
//! A [`ValueStream`] is written by one logical producer and read by any number of observers
//! through [`ValueIter`] cursors. Observers pick one of two disciplines:
//!
//! - **strict** iterators see every pushed value exactly once and in push order, at the cost
//!   of retaining history for as long as they lag behind
//! - **skip** iterators always jump to the most recent value, coalescing the backlog
//!
//! Observers never block the producer or each other.

mod iter;
mod subscribe;
mod value_stream;

pub use iter::ValueIter;
pub use subscribe::subscribe_channel;
pub use value_stream::{ReadOnlyValueStream, ValueStream};
