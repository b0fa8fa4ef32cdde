use std::fmt;
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::error::ConcurrencyResult;
use crate::signal::waitable::{Done, Generation, Waitable};

/// A published value and the link to its successor.
///
/// `next` is written once by the producer, before `ready` fires. Readers that observe
/// `ready` as done are therefore guaranteed to see the successor.
pub(crate) struct Node<T> {
    value: T,
    next: OnceLock<Arc<Node<T>>>,
    ready: Arc<Generation>,
}

impl<T> Node<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            value,
            next: OnceLock::new(),
            ready: Arc::new(Generation::pending()),
        }
    }

    pub(crate) fn value(&self) -> &T {
        &self.value
    }

    pub(crate) fn has_successor(&self) -> bool {
        self.next.get().is_some()
    }

    /// Links `successor` and wakes everyone waiting on this node.
    ///
    /// Returns `false` if the node already had a successor.
    pub(crate) fn link(&self, successor: Arc<Node<T>>) -> bool {
        if self.next.set(successor).is_err() {
            return false;
        }

        self.ready.fire();
        true
    }

    pub(crate) async fn wait_successor(&self) {
        self.ready.wait().await
    }

    pub(crate) fn ready(&self) -> Done {
        Done::from_generation(self.ready.clone())
    }
}

impl<T> Drop for Node<T> {
    // Unlinks the chain iteratively, a long unread backlog would otherwise recurse once per
    // node.
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.next.take(),
                Err(_) => break,
            }
        }
    }
}

/// State shared by a stream and its skip iterators.
pub(crate) struct Shared<T> {
    pub(crate) current: ArcSwap<Node<T>>,
    pub(crate) producer: Mutex<()>,
}

impl<T> Shared<T> {
    pub(crate) fn new(initial: T) -> Self {
        Self {
            current: ArcSwap::from_pointee(Node::new(initial)),
            producer: Mutex::new(()),
        }
    }
}

/// A read-only cursor positioned at one value of a [`crate::stream::ValueStream`].
///
/// A *strict* iterator follows the exact chain of pushed values, so every value is observed
/// once and in order. A *skip* iterator resolves to the stream's current value whenever it
/// advances, coalescing everything pushed in between.
///
/// Holding a strict iterator keeps every value from its position onward alive.
pub struct ValueIter<T> {
    node: Arc<Node<T>>,
    /// Set for skip iterators, which need the stream's current node to advance.
    shared: Option<Arc<Shared<T>>>,
}

impl<T> ValueIter<T> {
    pub(crate) fn strict(node: Arc<Node<T>>) -> Self {
        Self { node, shared: None }
    }

    pub(crate) fn skip(shared: Arc<Shared<T>>) -> Self {
        Self {
            node: shared.current.load_full(),
            shared: Some(shared),
        }
    }

    /// Returns an iterator at `node` with the same discipline as `self`.
    pub(crate) fn with_node(&self, node: Arc<Node<T>>) -> Self {
        Self {
            node,
            shared: self.shared.clone(),
        }
    }

    pub(crate) fn node(&self) -> &Arc<Node<T>> {
        &self.node
    }

    /// Returns the value this iterator is positioned at.
    pub fn value(&self) -> &T {
        self.node.value()
    }

    /// Returns `true` if this iterator visits every value instead of skipping to the newest.
    pub fn is_strict(&self) -> bool {
        self.shared.is_none()
    }

    /// Returns the next iterator if a newer value has been published, without waiting.
    pub fn try_next(&self) -> Option<Self> {
        let next = self.node.next.get()?;

        match &self.shared {
            None => Some(Self::strict(next.clone())),
            Some(shared) => Some(Self::skip(shared.clone())),
        }
    }

    /// Waits until a newer value exists, or `cancel` completes.
    ///
    /// A strict iterator resolves to the immediate successor, a skip iterator to the stream's
    /// current value at resolution time.
    pub async fn next<C>(&self, cancel: &C) -> ConcurrencyResult<Self>
    where
        C: Waitable + ?Sized,
    {
        let cancel_done = cancel.done();

        loop {
            if let Some(next) = self.try_next() {
                return Ok(next);
            }

            tokio::select! {
                biased;
                _ = self.node.wait_successor() => {}
                _ = cancel_done.wait() => return Err(cancel.cancellation_error()),
            }
        }
    }
}

impl<T> Clone for ValueIter<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ValueIter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueIter")
            .field("value", self.value())
            .field("strict", &self.is_strict())
            .finish()
    }
}

/// Completes once a value newer than this iterator's has been published.
impl<T> Waitable for ValueIter<T> {
    fn done(&self) -> Done {
        self.node.ready()
    }
}
