//! Node capabilities and edge bookkeeping.
//!
//! - [`Receiver`] accepts values pushed along an edge;
//! - [`Sender`] owns outgoing edges;
//! - [`GraphNode`] marks anything the network may keep alive.

use std::sync::Arc;

use parking_lot::RwLock;

/// Anything a [`DataNetwork`](crate::DataNetwork) can own.
pub trait GraphNode: Send + Sync + 'static {}

/// Accepts values of type `T`.
pub trait Receiver<T>: Send + Sync {
    /// Offers `value` to this node. Returns `false` if the node refused it.
    fn try_put(&self, value: T) -> bool;
}

/// Produces values of type `T` towards its successors.
pub trait Sender<T>: Send + Sync {
    /// Adds an outgoing edge to `successor`.
    fn register_successor(&self, successor: Arc<dyn Receiver<T>>);
}

/// Outgoing edges of one sender.
pub(crate) struct Successors<T> {
    list: RwLock<Vec<Arc<dyn Receiver<T>>>>,
}

impl<T> Default for Successors<T> {
    fn default() -> Self {
        Self {
            list: RwLock::new(Vec::new()),
        }
    }
}

impl<T: Clone> Successors<T> {
    pub(crate) fn add(&self, successor: Arc<dyn Receiver<T>>) {
        self.list.write().push(successor);
    }

    pub(crate) fn len(&self) -> usize {
        self.list.read().len()
    }

    /// Offers `value` to every successor; the last one receives it by move.
    ///
    /// Returns `true` if every successor accepted (vacuously true with no successor).
    pub(crate) fn broadcast(&self, value: T) -> bool {
        let list = self.list.read();
        let Some((last, rest)) = list.split_last() else {
            return true;
        };
        let mut accepted = true;
        for successor in rest {
            accepted &= successor.try_put(value.clone());
        }
        accepted & last.try_put(value)
    }
}
