use std::ops::Deref;
use std::sync::Arc;

use tracing::warn;

use crate::error::ConcurrencyResult;
use crate::signal::Waitable;
use crate::stream::iter::{Node, Shared, ValueIter};

/// Reader side of a [`ValueStream`].
///
/// Exposes everything except publishing, so a component can hand out its stream without
/// letting observers push into it.
pub struct ReadOnlyValueStream<T> {
    shared: Arc<Shared<T>>,
}

impl<T> ReadOnlyValueStream<T> {
    /// Returns an iterator positioned at the current value.
    pub fn iterator(&self, strict: bool) -> ValueIter<T> {
        if strict {
            ValueIter::strict(self.shared.current.load_full())
        } else {
            ValueIter::skip(self.shared.clone())
        }
    }

    /// Returns a copy of the most recently published value.
    pub fn current(&self) -> T
    where
        T: Clone,
    {
        self.shared.current.load().value().clone()
    }

    /// Jumps from `iter` to the most recent value if anything newer has been published.
    ///
    /// The returned iterator keeps the discipline of `iter`, which lets a strict consumer
    /// deliberately drop its backlog. Never blocks.
    pub fn try_fast_forward(&self, iter: &ValueIter<T>) -> Option<ValueIter<T>> {
        if !iter.node().has_successor() {
            return None;
        }

        Some(iter.with_node(self.shared.current.load_full()))
    }

    /// Waits until something newer than `iter` is published, then jumps to the most recent
    /// value.
    pub async fn fast_forward<C>(
        &self,
        iter: &ValueIter<T>,
        cancel: &C,
    ) -> ConcurrencyResult<ValueIter<T>>
    where
        C: Waitable + ?Sized,
    {
        let cancel_done = cancel.done();

        loop {
            if let Some(forwarded) = self.try_fast_forward(iter) {
                return Ok(forwarded);
            }

            tokio::select! {
                biased;
                _ = iter.node().wait_successor() => {}
                _ = cancel_done.wait() => return Err(cancel.cancellation_error()),
            }
        }
    }
}

impl<T> Clone for ReadOnlyValueStream<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

/// An append-only sequence of published values with lock-free readers.
///
/// The stream keeps a single reference to its current node, swapped atomically on every
/// [`ValueStream::push`]. Each node links to its successor exactly once, so readers traverse
/// the chain without locking and never observe a half-built node. Pushes are serialized
/// against each other; readers never wait on a push.
///
/// Reading operations are available through [`Deref`] to [`ReadOnlyValueStream`].
pub struct ValueStream<T> {
    reader: ReadOnlyValueStream<T>,
}

impl<T> ValueStream<T> {
    /// Creates a new stream whose current value is `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            reader: ReadOnlyValueStream {
                shared: Arc::new(Shared::new(initial)),
            },
        }
    }

    /// Publishes `value` as the new current value.
    ///
    /// Returns the value it replaced and a strict iterator positioned at the new value.
    pub fn push(&self, value: T) -> (T, ValueIter<T>)
    where
        T: Clone,
    {
        let shared = &self.reader.shared;
        let _producer = shared.producer.lock();

        let node = Arc::new(Node::new(value));
        let previous = shared.current.swap(node.clone());

        // Only the producer holding the lock links nodes, so the slot is still empty.
        if !previous.link(node.clone()) {
            warn!("value stream node was already linked to a successor");
        }

        (previous.value().clone(), ValueIter::strict(node))
    }

    /// Returns a handle for readers that cannot publish.
    pub fn read_only(&self) -> ReadOnlyValueStream<T> {
        self.reader.clone()
    }
}

impl<T> Deref for ValueStream<T> {
    type Target = ReadOnlyValueStream<T>;

    fn deref(&self) -> &Self::Target {
        &self.reader
    }
}
