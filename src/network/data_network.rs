//! # Data network: one typed channel per payload type.
//!
//! Plugins add nodes; the network creates the channel for a payload type on first use
//! and wires the node to it.
//!
//! ```text
//!  add_source_node::<T>(n) ─► n ──► channel<T> ──► sinks of T
//!  add_sink_node::<T>(s)   ─►        channel<T> ──► s
//!  push::<T>(v)            ─►        channel<T> ──► every sink of T
//!
//!  HashMap<TypeTag, Channel>  (created lazily, frozen by finalize())
//! ```
//!
//! ## Rules
//! - Adding nodes after [`DataNetwork::finalize`] fails with [`NetworkError::Finalized`].
//! - Pushing a type nobody wired fails with [`NetworkError::MissingChannel`].
//! - Pushing into a cancelled network fails with [`NetworkError::Rejected`].
//! - Dropping the last handle cancels the graph and waits for it (unless dropped from a
//!   graph job, where it only cancels).
//! - The network is a cloneable handle; node bodies that need it should hold a
//!   [`WeakNetwork`] to avoid keeping it alive through its own nodes.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::runtime::Handle;

use crate::error::NetworkError;
use crate::types::{Payload, TypeTag};

use super::graph::{Graph, in_graph_job};
use super::node::{GraphNode, Receiver, Sender};
use super::nodes::{BroadcastNode, OutputPort};

struct Channel {
    type_id: TypeId,
    type_name: &'static str,
    node: Arc<dyn Any + Send + Sync>,
}

#[derive(Default)]
struct Topology {
    finalized: bool,
    channels: HashMap<TypeTag, Channel>,
    nodes: Vec<Arc<dyn GraphNode>>,
}

struct NetworkInner {
    graph: Graph,
    topology: RwLock<Topology>,
}

impl Drop for NetworkInner {
    fn drop(&mut self) {
        if in_graph_job() {
            self.graph.cancel_nowait();
        } else {
            self.graph.cancel();
        }
    }
}

/// Typed dataflow network owned by one pipeline run.
#[derive(Clone)]
pub struct DataNetwork {
    inner: Arc<NetworkInner>,
}

/// Non-owning handle to a [`DataNetwork`].
#[derive(Clone)]
pub struct WeakNetwork {
    inner: Weak<NetworkInner>,
}

impl WeakNetwork {
    pub fn upgrade(&self) -> Option<DataNetwork> {
        self.inner.upgrade().map(|inner| DataNetwork { inner })
    }
}

impl DataNetwork {
    /// Creates an empty network whose graph runs on `handle`.
    pub(crate) fn new(handle: Handle) -> Self {
        Self {
            inner: Arc::new(NetworkInner {
                graph: Graph::new(handle),
                topology: RwLock::new(Topology::default()),
            }),
        }
    }

    /// Graph that node constructors must be given.
    #[inline]
    pub fn graph(&self) -> &Graph {
        &self.inner.graph
    }

    /// Unique id of this network (the id of its graph).
    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.graph.id()
    }

    pub fn ptr_eq(&self, other: &DataNetwork) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakNetwork {
        WeakNetwork {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Adds `node` as a producer of `T`, creating the channel for `T` if needed.
    pub fn add_source_node<T, N>(&self, node: Arc<N>) -> Result<(), NetworkError>
    where
        T: Payload,
        N: Sender<T> + GraphNode,
    {
        let mut topology = self.inner.topology.write();
        if topology.finalized {
            return Err(NetworkError::Finalized { role: "source" });
        }
        let channel = Self::channel_entry::<T>(&mut topology, &self.inner.graph);
        node.register_successor(channel);
        topology.nodes.push(node);
        tracing::trace!(network = self.id(), payload = T::type_name(), "source node added");
        Ok(())
    }

    /// Adds `node` as a consumer of `T`, creating the channel for `T` if needed.
    pub fn add_sink_node<T, N>(&self, node: Arc<N>) -> Result<(), NetworkError>
    where
        T: Payload,
        N: Receiver<T> + GraphNode,
    {
        let mut topology = self.inner.topology.write();
        if topology.finalized {
            return Err(NetworkError::Finalized { role: "sink" });
        }
        let channel = Self::channel_entry::<T>(&mut topology, &self.inner.graph);
        channel.register_successor(node.clone());
        topology.nodes.push(node);
        tracing::trace!(network = self.id(), payload = T::type_name(), "sink node added");
        Ok(())
    }

    /// Adds `node` as a producer of `T` through one of its output ports.
    ///
    /// Call once per port; the node itself is kept alive once per call.
    pub fn add_multi_source_node<T, N>(
        &self,
        node: Arc<N>,
        port: &OutputPort<T>,
    ) -> Result<(), NetworkError>
    where
        T: Payload,
        N: GraphNode,
    {
        let mut topology = self.inner.topology.write();
        if topology.finalized {
            return Err(NetworkError::Finalized {
                role: "multi-source",
            });
        }
        let channel = Self::channel_entry::<T>(&mut topology, &self.inner.graph);
        port.register_successor(channel);
        topology.nodes.push(node);
        tracing::trace!(
            network = self.id(),
            payload = T::type_name(),
            "multi-source port added"
        );
        Ok(())
    }

    /// Pushes `value` into the channel of `T`.
    pub fn push<T: Payload>(&self, value: T) -> Result<(), NetworkError> {
        let channel = self
            .channel::<T>()
            .ok_or(NetworkError::MissingChannel {
                tag: T::TAG,
                type_name: T::type_name(),
            })?;
        if channel.try_put(value) {
            Ok(())
        } else {
            Err(NetworkError::Rejected {
                tag: T::TAG,
                type_name: T::type_name(),
            })
        }
    }

    /// True if a channel for `T` exists.
    pub fn has_channel<T: Payload>(&self) -> bool {
        self.inner.topology.read().channels.contains_key(&T::TAG)
    }

    /// Freezes the topology. Idempotent.
    pub fn finalize(&self) {
        let mut topology = self.inner.topology.write();
        if !topology.finalized {
            topology.finalized = true;
            tracing::debug!(
                network = self.id(),
                channels = topology.channels.len(),
                nodes = topology.nodes.len(),
                "network finalized"
            );
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.inner.topology.read().finalized
    }

    /// Number of nodes added so far.
    pub fn node_count(&self) -> usize {
        self.inner.topology.read().nodes.len()
    }

    /// Blocks until the graph has no outstanding work.
    ///
    /// # Panics
    /// When called from inside a graph job.
    pub fn wait_for_completion(&self) {
        self.inner.graph.wait_for_all();
    }

    /// Cancels outstanding work and waits for running jobs.
    ///
    /// # Panics
    /// When called from inside a graph job.
    pub fn cancel(&self) {
        self.inner.graph.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.graph.is_cancelled()
    }

    fn channel<T: Payload>(&self) -> Option<Arc<BroadcastNode<T>>> {
        let topology = self.inner.topology.read();
        let channel = topology.channels.get(&T::TAG)?;
        Some(Self::downcast::<T>(channel))
    }

    /// Returns the channel of `T`, creating it on first use.
    fn channel_entry<T: Payload>(topology: &mut Topology, graph: &Graph) -> Arc<BroadcastNode<T>> {
        let channel = topology.channels.entry(T::TAG).or_insert_with(|| Channel {
            type_id: TypeId::of::<T>(),
            type_name: T::type_name(),
            node: BroadcastNode::<T>::new(graph),
        });
        Self::downcast::<T>(channel)
    }

    /// # Panics
    /// If the tag of `T` is already bound to a different Rust type.
    fn downcast<T: Payload>(channel: &Channel) -> Arc<BroadcastNode<T>> {
        if channel.type_id != TypeId::of::<T>() {
            panic!(
                "payload tag {} is bound to both {} and {}",
                T::TAG,
                channel.type_name,
                T::type_name()
            );
        }
        match Arc::clone(&channel.node).downcast::<BroadcastNode<T>>() {
            Ok(node) => node,
            Err(_) => unreachable!("channel node type follows its type id"),
        }
    }
}

impl fmt::Debug for DataNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topology = self.inner.topology.read();
        f.debug_struct("DataNetwork")
            .field("id", &self.id())
            .field("finalized", &topology.finalized)
            .field("channels", &topology.channels.len())
            .field("nodes", &topology.nodes.len())
            .finish()
    }
}
