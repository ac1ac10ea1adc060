//! # Graph-scheduled data source.
//!
//! [`SimpleDataSource`] wraps a [`SourceNode`]: the body runs on the worker pool one step
//! at a time, so it must return quickly. Use
//! [`OwnThreadDataSource`](crate::OwnThreadDataSource) for bodies that block.
//!
//! ```text
//! start() ─► on_start hook ─► node.activate() ─► body() ─► Some(v) ─► channel<T>
//!                                                  ▲          │
//!                                                  └──────────┘ (next step)
//! stop()  ─► on_stop hook ─► node.halt() ─► wait until the running step finished
//! ```

use std::sync::Arc;

use crate::error::{NetworkError, Outcome};
use crate::network::{DataNetwork, SourceNode};
use crate::types::Payload;

use super::source::DataSource;

pub(crate) type Hook = Box<dyn FnMut() -> Outcome + Send>;

/// Data source driven by the graph scheduler.
pub struct SimpleDataSource<T: Payload> {
    node: Arc<SourceNode<T>>,
    on_start: Option<Hook>,
    on_stop: Option<Hook>,
}

impl<T: Payload> SimpleDataSource<T> {
    /// Creates the source node and wires it into `network` as a producer of `T`.
    ///
    /// `body` returns `None` once there is nothing left to produce.
    pub fn new<F>(network: &DataNetwork, body: F) -> Result<Self, NetworkError>
    where
        F: FnMut() -> Option<T> + Send + 'static,
    {
        let node = SourceNode::new(network.graph(), body);
        network.add_source_node::<T, _>(Arc::clone(&node))?;
        Ok(Self {
            node,
            on_start: None,
            on_stop: None,
        })
    }

    /// Runs `hook` before the first step; a failing hook prevents the start.
    pub fn on_start<F>(mut self, hook: F) -> Self
    where
        F: FnMut() -> Outcome + Send + 'static,
    {
        self.on_start = Some(Box::new(hook));
        self
    }

    /// Runs `hook` when the source is stopped.
    pub fn on_stop<F>(mut self, hook: F) -> Self
    where
        F: FnMut() -> Outcome + Send + 'static,
    {
        self.on_stop = Some(Box::new(hook));
        self
    }

    /// True while a step is scheduled or running.
    pub fn is_active(&self) -> bool {
        self.node.is_active()
    }
}

impl<T: Payload> DataSource for SimpleDataSource<T> {
    fn start(&mut self) -> Outcome {
        let out = self.on_start.as_mut().map_or_else(Outcome::success, |hook| hook());
        if out.is_success() {
            self.node.activate();
        }
        out
    }

    fn stop(&mut self) -> Outcome {
        let out = self.on_stop.as_mut().map_or_else(Outcome::success, |hook| hook());
        self.node.halt();
        self.node.wait_until_idle();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Concurrency, FunctionNode, test_support::runtime};
    use crate::types::testing::Sample;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_produces_until_exhausted() {
        let rt = runtime();
        let network = DataNetwork::new(rt.handle().clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            FunctionNode::new(network.graph(), Concurrency::Serial, move |s: Sample| {
                seen.lock().push(s.0)
            })
        };
        network.add_sink_node::<Sample, _>(sink).unwrap();

        let mut n = 0;
        let mut source = SimpleDataSource::new(&network, move || {
            n += 1;
            (n <= 5).then_some(Sample(n))
        })
        .unwrap();
        network.finalize();

        assert!(source.start().is_success());
        network.wait_for_completion();
        assert!(source.stop().is_success());

        assert_eq!(*seen.lock(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_failing_start_hook_keeps_source_idle() {
        let rt = runtime();
        let network = DataNetwork::new(rt.handle().clone());
        let mut source = SimpleDataSource::new(&network, || -> Option<Sample> {
            unreachable!("body must not run")
        })
        .unwrap()
        .on_start(|| Outcome::failure("device unavailable"));

        let out = source.start();
        assert!(out.is_failure());
        assert!(!source.is_active());
        assert!(source.stop().is_success());
    }

    #[test]
    fn test_stop_hook_runs_and_reports() {
        let rt = runtime();
        let network = DataNetwork::new(rt.handle().clone());
        let calls = Arc::new(AtomicUsize::new(0));
        let mut source = {
            let calls = Arc::clone(&calls);
            SimpleDataSource::new(&network, || Some(Sample(0)))
                .unwrap()
                .on_stop(move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Outcome::failure("flush failed")
                })
        };

        assert!(source.start().is_success());
        assert!(source.stop().is_failure());
        assert!(!source.is_active());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_new_after_finalize_fails() {
        let rt = runtime();
        let network = DataNetwork::new(rt.handle().clone());
        network.finalize();
        let err = SimpleDataSource::new(&network, || None::<Sample>).err();
        assert_eq!(err, Some(NetworkError::Finalized { role: "source" }));
    }
}
