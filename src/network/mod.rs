//! Dataflow network: graph scheduling, node kinds and the typed channel table.
//!
//! - [`Graph`] schedules node work on the worker pool and tracks quiescence;
//! - [`BroadcastNode`], [`FunctionNode`], [`SourceNode`] and [`OutputPort`] are the
//!   building blocks plugins wire together;
//! - [`DataNetwork`] owns one channel per payload type and the nodes attached to it.

mod data_network;
mod graph;
mod node;
mod nodes;

pub use data_network::{DataNetwork, WeakNetwork};
pub use graph::Graph;
pub use node::{GraphNode, Receiver, Sender};
pub use nodes::{BroadcastNode, Concurrency, FunctionNode, OutputPort, SourceNode};

pub(crate) use nodes::panic_message;

#[cfg(test)]
pub(crate) use graph::test_support;
