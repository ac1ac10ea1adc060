//! Worker pool shared by every network of one manager.

use std::io;

use tokio::runtime::{Builder, Handle, Runtime};

use super::config::PipelineConfig;

/// Multi-threaded tokio runtime used as a plain job pool.
pub(crate) struct WorkerPool {
    handle: Handle,
    runtime: Option<Runtime>,
}

impl WorkerPool {
    pub(crate) fn new(cfg: &PipelineConfig) -> io::Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.thread_name(cfg.thread_name.clone());
        if let Some(n) = cfg.worker_threads() {
            builder.worker_threads(n);
        }
        let runtime = builder.build()?;
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    /// Handle used by graphs to schedule jobs.
    pub(crate) fn handle(&self) -> Handle {
        self.handle.clone()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Runtime::drop panics when run from async context; shutdown_background does not.
        if let Some(rt) = self.runtime.take() {
            rt.shutdown_background();
        }
    }
}
