//! # Node kinds.
//!
//! | Node              | Receives | Sends | Runs work on graph |
//! |-------------------|----------|-------|--------------------|
//! | [`BroadcastNode`] | `T`      | `T`   | no (inline fan-out)|
//! | [`FunctionNode`]  | `I`      | `O`   | yes, bounded       |
//! | [`OutputPort`]    | -        | `T`   | no (handle)        |
//! | [`SourceNode`]    | -        | `T`   | yes, one step/job  |
//!
//! ## Rules
//! - Every node refuses values once its graph is cancelled.
//! - A panicking node body loses the item it was processing; the node keeps running.
//! - [`FunctionNode`] with [`Concurrency::Serial`] processes items in arrival order.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::graph::Graph;
use super::node::{GraphNode, Receiver, Sender, Successors};

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Fan-out node: forwards each value to all successors.
///
/// The data network uses one per payload type as the channel for that type.
pub struct BroadcastNode<T> {
    graph: Graph,
    successors: Successors<T>,
}

impl<T: Clone + Send + Sync + 'static> BroadcastNode<T> {
    pub fn new(graph: &Graph) -> Arc<Self> {
        Arc::new(Self {
            graph: graph.clone(),
            successors: Successors::default(),
        })
    }

    /// Number of outgoing edges.
    pub fn successor_count(&self) -> usize {
        self.successors.len()
    }
}

impl<T: Clone + Send + Sync + 'static> Receiver<T> for BroadcastNode<T> {
    fn try_put(&self, value: T) -> bool {
        if self.graph.is_cancelled() {
            return false;
        }
        self.successors.broadcast(value)
    }
}

impl<T: Clone + Send + Sync + 'static> Sender<T> for BroadcastNode<T> {
    fn register_successor(&self, successor: Arc<dyn Receiver<T>>) {
        self.successors.add(successor);
    }
}

impl<T: Clone + Send + Sync + 'static> GraphNode for BroadcastNode<T> {}

/// How many bodies of one [`FunctionNode`] may run at the same time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Concurrency {
    /// One at a time, in arrival order.
    #[default]
    Serial,
    /// At most `n` at a time (`0` is treated as `1`).
    Limited(usize),
    /// No limit.
    Unlimited,
}

impl Concurrency {
    fn limit(self) -> usize {
        match self {
            Concurrency::Serial => 1,
            Concurrency::Limited(n) => n.max(1),
            Concurrency::Unlimited => usize::MAX,
        }
    }
}

type Body<I, O> = Box<dyn Fn(I) -> O + Send + Sync>;

struct FunctionState<I> {
    active: usize,
    queue: VecDeque<I>,
}

struct FunctionInner<I, O> {
    graph: Graph,
    limit: usize,
    body: Body<I, O>,
    state: Mutex<FunctionState<I>>,
    successors: Successors<O>,
}

impl<I, O> FunctionInner<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    /// Processes `item`, then keeps draining the queue while work is left.
    fn run(&self, mut item: I) {
        loop {
            match catch_unwind(AssertUnwindSafe(|| (self.body)(item))) {
                Ok(output) => {
                    self.successors.broadcast(output);
                }
                Err(panic) => {
                    tracing::error!(
                        graph = self.graph.id(),
                        reason = panic_message(panic.as_ref()),
                        "function node body panicked, item dropped"
                    );
                }
            }

            let mut state = self.state.lock();
            if self.graph.is_cancelled() {
                state.queue.clear();
                state.active -= 1;
                return;
            }
            match state.queue.pop_front() {
                Some(next) => item = next,
                None => {
                    state.active -= 1;
                    return;
                }
            }
        }
    }
}

/// Applies a body to each received value and forwards the result.
///
/// With `O = ()` the node is a pure sink.
pub struct FunctionNode<I, O = ()> {
    inner: Arc<FunctionInner<I, O>>,
}

impl<I, O> FunctionNode<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    pub fn new<F>(graph: &Graph, concurrency: Concurrency, body: F) -> Arc<Self>
    where
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        Arc::new(Self {
            inner: Arc::new(FunctionInner {
                graph: graph.clone(),
                limit: concurrency.limit(),
                body: Box::new(body),
                state: Mutex::new(FunctionState {
                    active: 0,
                    queue: VecDeque::new(),
                }),
                successors: Successors::default(),
            }),
        })
    }

    /// Items waiting for a free slot.
    pub fn queued(&self) -> usize {
        self.inner.state.lock().queue.len()
    }
}

impl<I, O> Receiver<I> for FunctionNode<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    fn try_put(&self, value: I) -> bool {
        let graph = &self.inner.graph;
        if graph.is_cancelled() {
            return false;
        }
        {
            let mut state = self.inner.state.lock();
            if state.active >= self.inner.limit {
                state.queue.push_back(value);
                return true;
            }
            state.active += 1;
        }
        let inner = Arc::clone(&self.inner);
        if graph.spawn(move || inner.run(value)) {
            true
        } else {
            self.inner.state.lock().active -= 1;
            false
        }
    }
}

impl<I, O> Sender<O> for FunctionNode<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    fn register_successor(&self, successor: Arc<dyn Receiver<O>>) {
        self.inner.successors.add(successor);
    }
}

impl<I, O> GraphNode for FunctionNode<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
}

/// Typed output of a node that produces several payload types.
///
/// The node body keeps a clone and calls [`OutputPort::put`]; the network wires the port
/// to the channel through [`DataNetwork::add_multi_source_node`](crate::DataNetwork::add_multi_source_node).
pub struct OutputPort<T> {
    graph: Graph,
    successors: Arc<Successors<T>>,
}

impl<T> Clone for OutputPort<T> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            successors: Arc::clone(&self.successors),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> OutputPort<T> {
    pub fn new(graph: &Graph) -> Self {
        Self {
            graph: graph.clone(),
            successors: Arc::new(Successors::default()),
        }
    }

    /// Emits `value` on this port. Returns `false` if the graph is cancelled or a
    /// successor refused the value.
    pub fn put(&self, value: T) -> bool {
        if self.graph.is_cancelled() {
            return false;
        }
        self.successors.broadcast(value)
    }
}

impl<T: Clone + Send + Sync + 'static> Sender<T> for OutputPort<T> {
    fn register_successor(&self, successor: Arc<dyn Receiver<T>>) {
        self.successors.add(successor);
    }
}

type Producer<T> = Box<dyn FnMut() -> Option<T> + Send>;

#[derive(Default)]
struct SourceState {
    active: bool,
    finished: bool,
    halted: bool,
}

struct SourceInner<T> {
    graph: Graph,
    body: Mutex<Producer<T>>,
    successors: Successors<T>,
    state: Mutex<SourceState>,
    idle: Condvar,
}

impl<T: Clone + Send + Sync + 'static> SourceInner<T> {
    fn mark_idle(&self) {
        self.state.lock().active = false;
        self.idle.notify_all();
    }

    fn schedule(self: &Arc<Self>) {
        let step = StepGuard {
            inner: Some(Arc::clone(self)),
        };
        // A refused or dropped job releases the guard, which marks the source idle.
        self.graph.spawn(move || step.run());
    }
}

/// Keeps a source marked active for exactly as long as one step is in flight.
struct StepGuard<T: Clone + Send + Sync + 'static> {
    inner: Option<Arc<SourceInner<T>>>,
}

impl<T: Clone + Send + Sync + 'static> StepGuard<T> {
    fn run(mut self) {
        let Some(inner) = self.inner.clone() else {
            return;
        };
        if inner.state.lock().halted {
            return;
        }

        let produced = {
            let mut body = inner.body.lock();
            catch_unwind(AssertUnwindSafe(|| (*body)()))
        };
        match produced {
            Ok(Some(value)) => {
                inner.successors.broadcast(value);
                if inner.graph.is_cancelled() || inner.state.lock().halted {
                    return;
                }
                // Ownership of the active flag moves to the next step.
                self.inner = None;
                inner.schedule();
            }
            Ok(None) => {
                inner.state.lock().finished = true;
            }
            Err(panic) => {
                tracing::error!(
                    graph = inner.graph.id(),
                    reason = panic_message(panic.as_ref()),
                    "source node body panicked, source finished"
                );
                inner.state.lock().finished = true;
            }
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for StepGuard<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.mark_idle();
        }
    }
}

/// Pull-driven producer scheduled on the graph one step at a time.
///
/// Each step calls the body once; `Some(value)` is forwarded and another step is scheduled,
/// `None` ends the source for good. Nothing runs before [`SourceNode::activate`].
pub struct SourceNode<T: Clone + Send + Sync + 'static> {
    inner: Arc<SourceInner<T>>,
}

impl<T: Clone + Send + Sync + 'static> SourceNode<T> {
    pub fn new<F>(graph: &Graph, body: F) -> Arc<Self>
    where
        F: FnMut() -> Option<T> + Send + 'static,
    {
        Arc::new(Self {
            inner: Arc::new(SourceInner {
                graph: graph.clone(),
                body: Mutex::new(Box::new(body)),
                successors: Successors::default(),
                state: Mutex::new(SourceState::default()),
                idle: Condvar::new(),
            }),
        })
    }

    /// Starts producing. Returns `false` if already active, finished or halted.
    pub fn activate(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.active || state.finished || state.halted {
                return false;
            }
            state.active = true;
        }
        self.inner.schedule();
        true
    }

    /// Stops scheduling further steps. A step already running completes.
    pub fn halt(&self) {
        self.inner.state.lock().halted = true;
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active
    }

    /// True once the body returned `None` or panicked.
    pub fn is_finished(&self) -> bool {
        self.inner.state.lock().finished
    }

    /// Blocks until no step is in flight.
    pub fn wait_until_idle(&self) {
        let mut state = self.inner.state.lock();
        while state.active {
            self.inner.idle.wait(&mut state);
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Sender<T> for SourceNode<T> {
    fn register_successor(&self, successor: Arc<dyn Receiver<T>>) {
        self.inner.successors.add(successor);
    }
}

impl<T: Clone + Send + Sync + 'static> GraphNode for SourceNode<T> {}
