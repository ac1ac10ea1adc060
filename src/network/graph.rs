//! # Graph: the execution scope shared by every node of one network.
//!
//! A [`Graph`] schedules node work on the shared worker pool (a tokio runtime) and keeps
//! count of outstanding jobs so that callers can block until the graph is quiet.
//!
//! ```text
//!  node.try_put(v) ──► Graph::spawn(job) ──► pending += 1 ──► runtime worker
//!                                                               │
//!                                   token cancelled? ── yes ──► drop job
//!                                                               │ no
//!                                                               ▼
//!                                                            job()
//!                                                               │
//!                                           pending -= 1 ◄──────┘ (also on panic/drop)
//!                                                │
//!                               pending == 0 ──► wake wait_for_all()
//! ```
//!
//! ## Rules
//! - Every graph owns an **isolated** [`CancellationToken`]; canceling one graph never
//!   touches another, even though they share the same worker pool.
//! - `cancel()` drops queued jobs, lets running jobs finish, then waits for quiescence.
//! - Blocking waits are refused from inside a graph job: the job would be waiting on itself.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Source of graph identities.
static GRAPH_IDS: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static IN_GRAPH_JOB: Cell<bool> = const { Cell::new(false) };
}

/// True while the current thread is executing a graph job.
pub(crate) fn in_graph_job() -> bool {
    IN_GRAPH_JOB.with(Cell::get)
}

/// Marks the current thread as running a graph job until dropped.
struct JobScope {
    previous: bool,
}

impl JobScope {
    fn enter() -> Self {
        let previous = IN_GRAPH_JOB.with(|flag| flag.replace(true));
        Self { previous }
    }
}

impl Drop for JobScope {
    fn drop(&mut self) {
        IN_GRAPH_JOB.with(|flag| flag.set(self.previous));
    }
}

struct GraphInner {
    id: u64,
    handle: Handle,
    token: CancellationToken,
    pending: Mutex<usize>,
    idle: Condvar,
}

/// Counts one outstanding job; decrements on drop whatever happens to the job.
struct PendingGuard {
    inner: Arc<GraphInner>,
}

impl PendingGuard {
    fn enter(inner: &Arc<GraphInner>) -> Self {
        *inner.pending.lock() += 1;
        Self {
            inner: Arc::clone(inner),
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut pending = self.inner.pending.lock();
        *pending -= 1;
        if *pending == 0 {
            self.inner.idle.notify_all();
        }
    }
}

/// Cloneable handle to one task graph.
///
/// Clones share state; [`Graph::id`] identifies the underlying graph.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

impl Graph {
    /// Creates a graph scheduling its jobs on the runtime behind `handle`.
    pub(crate) fn new(handle: Handle) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                id: GRAPH_IDS.fetch_add(1, Ordering::Relaxed),
                handle,
                token: CancellationToken::new(),
                pending: Mutex::new(0),
                idle: Condvar::new(),
            }),
        }
    }

    /// Unique id of this graph.
    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Token cancelled when this graph is cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Number of jobs scheduled and not yet finished.
    pub fn outstanding(&self) -> usize {
        *self.inner.pending.lock()
    }

    /// Schedules `job` on the worker pool.
    ///
    /// Returns `false` (and drops `job`) if the graph is already cancelled. A job still
    /// queued when the graph gets cancelled is dropped without running.
    pub fn spawn<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_cancelled() {
            return false;
        }
        let pending = PendingGuard::enter(&self.inner);
        let token = self.inner.token.clone();
        self.inner.handle.spawn(async move {
            let _pending = pending;
            if token.is_cancelled() {
                return;
            }
            let _scope = JobScope::enter();
            job();
        });
        true
    }

    /// Blocks until no job is outstanding.
    ///
    /// Does not prevent other threads from scheduling more work meanwhile.
    ///
    /// # Panics
    /// When called from inside a graph job.
    pub fn wait_for_all(&self) {
        assert!(
            !in_graph_job(),
            "graph {} waited for its own completion from inside a graph job",
            self.inner.id
        );
        let mut pending = self.inner.pending.lock();
        while *pending > 0 {
            self.inner.idle.wait(&mut pending);
        }
    }

    /// Cancels queued work, then waits for running jobs to finish.
    ///
    /// # Panics
    /// When called from inside a graph job.
    pub fn cancel(&self) {
        self.inner.token.cancel();
        self.wait_for_all();
    }

    /// Cancels without waiting; used on drop paths that may run inside a job.
    pub(crate) fn cancel_nowait(&self) {
        self.inner.token.cancel();
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.inner.id)
            .field("cancelled", &self.is_cancelled())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use tokio::runtime::{Builder, Runtime};

    /// Small multi-thread runtime for graph tests.
    pub(crate) fn runtime() -> Runtime {
        Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("graph-test")
            .build()
            .expect("test runtime")
    }
}
