//! # Data source running on its own OS thread.
//!
//! [`OwnThreadDataSource`] is for bodies that block (reading a device, sleeping between
//! samples). The thread loops `body()` and pushes every value into the network until the
//! body returns `None` or the source is stopped.
//!
//! ## Rules
//! - `stop()` blocks until the thread exited; the body should return within a bounded time.
//! - A push refused by the network is logged and skipped; the loop continues.
//! - A panicking body ends the thread; `stop()` still returns and reports it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crate::error::Outcome;
use crate::network::{DataNetwork, panic_message};
use crate::types::Payload;

use super::completion::{Completion, FinishOnDrop};
use super::simple::Hook;
use super::source::DataSource;

type Body<T> = Box<dyn FnMut() -> Option<T> + Send>;

/// Data source with a dedicated producer thread.
pub struct OwnThreadDataSource<T: Payload> {
    name: String,
    network: DataNetwork,
    body: Option<Body<T>>,
    on_start: Option<Hook>,
    on_stop: Option<Hook>,
    halt: Arc<AtomicBool>,
    done: Arc<Completion>,
    thread: Option<JoinHandle<()>>,
}

impl<T: Payload> OwnThreadDataSource<T> {
    /// Creates a source pushing into `network`. `name` becomes the thread name.
    ///
    /// The network must have a channel for `T` by the time the source starts.
    pub fn new<F>(name: impl Into<String>, network: &DataNetwork, body: F) -> Self
    where
        F: FnMut() -> Option<T> + Send + 'static,
    {
        Self {
            name: name.into(),
            network: network.clone(),
            body: Some(Box::new(body)),
            on_start: None,
            on_stop: None,
            halt: Arc::new(AtomicBool::new(false)),
            done: Arc::new(Completion::default()),
            thread: None,
        }
    }

    pub fn on_start<F>(mut self, hook: F) -> Self
    where
        F: FnMut() -> Outcome + Send + 'static,
    {
        self.on_start = Some(Box::new(hook));
        self
    }

    pub fn on_stop<F>(mut self, hook: F) -> Self
    where
        F: FnMut() -> Outcome + Send + 'static,
    {
        self.on_stop = Some(Box::new(hook));
        self
    }

    /// True once the producer thread has exited (or was never started).
    pub fn is_finished(&self) -> bool {
        self.thread.is_none() || self.done.is_done()
    }

    fn produce(mut body: Body<T>, network: DataNetwork, halt: Arc<AtomicBool>, done: Arc<Completion>) {
        let _done = FinishOnDrop(&done);
        while !halt.load(Ordering::Acquire) {
            let Some(value) = body() else {
                tracing::debug!(payload = T::type_name(), "data source exhausted");
                break;
            };
            if let Err(err) = network.push(value) {
                tracing::debug!(error = %err, label = err.as_label(), "data source push skipped");
            }
        }
    }
}

impl<T: Payload> DataSource for OwnThreadDataSource<T> {
    fn start(&mut self) -> Outcome {
        let Some(body) = self.body.take() else {
            return Outcome::failure(format!("data source {} was already started", self.name));
        };
        let out = self.on_start.as_mut().map_or_else(Outcome::success, |hook| hook());
        if out.is_failure() {
            self.body = Some(body);
            return out;
        }

        let network = self.network.clone();
        let halt = Arc::clone(&self.halt);
        let done = Arc::clone(&self.done);
        match std::thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || Self::produce(body, network, halt, done))
        {
            Ok(handle) => {
                self.thread = Some(handle);
                Outcome::success()
            }
            Err(err) => Outcome::failure(format!(
                "unable to spawn thread for data source {}: {err}",
                self.name
            )),
        }
    }

    fn stop(&mut self) -> Outcome {
        let mut out = self.on_stop.as_mut().map_or_else(Outcome::success, |hook| hook());
        self.halt.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            self.done.wait();
            if let Err(panic) = handle.join() {
                out.fail(format!(
                    "data source {} panicked: {}",
                    self.name,
                    panic_message(panic.as_ref())
                ));
            }
        }
        out
    }
}

impl<T: Payload> Drop for OwnThreadDataSource<T> {
    fn drop(&mut self) {
        self.halt.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Concurrency, FunctionNode, test_support::runtime};
    use crate::types::testing::Sample;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn wired() -> (tokio::runtime::Runtime, DataNetwork, Arc<Mutex<Vec<u64>>>) {
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
        network.finalize();
        (rt, network, seen)
    }

    #[test]
    fn test_thread_pushes_until_exhausted() {
        let (_rt, network, seen) = wired();
        let mut n = 0;
        let mut source = OwnThreadDataSource::new("counter", &network, move || {
            n += 1;
            (n <= 4).then_some(Sample(n))
        });

        assert!(source.start().is_success());
        source.done.wait();
        network.wait_for_completion();
        assert!(source.is_finished());
        assert!(source.stop().is_success());

        assert_eq!(*seen.lock(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_stop_interrupts_endless_body() {
        let (_rt, network, seen) = wired();
        let mut source = OwnThreadDataSource::new("ticker", &network, || {
            std::thread::sleep(Duration::from_millis(1));
            Some(Sample(1))
        });

        assert!(source.start().is_success());
        std::thread::sleep(Duration::from_millis(20));
        assert!(source.stop().is_success());
        network.wait_for_completion();

        let count = seen.lock().len();
        std::thread::sleep(Duration::from_millis(10));
        network.wait_for_completion();
        assert_eq!(seen.lock().len(), count);
    }

    #[test]
    fn test_second_start_fails() {
        let (_rt, network, _) = wired();
        let mut source = OwnThreadDataSource::new("once", &network, || None::<Sample>);
        assert!(source.start().is_success());
        assert!(source.start().is_failure());
        assert!(source.stop().is_success());
    }

    #[test]
    fn test_panicking_body_is_reported_on_stop() {
        let (_rt, network, _) = wired();
        let mut source =
            OwnThreadDataSource::new("faulty", &network, || -> Option<Sample> { panic!("sensor") });
        assert!(source.start().is_success());
        let out = source.stop();
        assert!(out.is_failure());
        assert!(out.message().contains("sensor"));
    }
}
