//! # Pipeline manager configuration.
//!
//! Provides [`PipelineConfig`], consumed by
//! [`PipelineBuilder`](crate::PipelineBuilder).
//!
//! ## Sentinel values
//! - `worker_threads = 0` → one worker per CPU (runtime default)
//! - `notification_capacity = 0` → clamped to 1

/// Configuration of one pipeline manager.
///
/// ## Field semantics
/// - `worker_threads`: threads of the worker pool shared by every network (`0` = per CPU)
/// - `thread_name`: name prefix of pool threads
/// - `notification_capacity`: plugin notifications buffered for the host callback
/// - `bus_capacity`: lifecycle event ring buffer size (min 1)
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Number of worker threads running node work.
    ///
    /// - `0` = one per CPU
    /// - `n > 0` = exactly `n`
    pub worker_threads: usize,

    /// Name given to worker pool threads.
    pub thread_name: String,

    /// Notifications waiting for the host callback.
    ///
    /// Further notifications are dropped (with a warning) while the queue is full.
    pub notification_capacity: usize,

    /// Capacity of the lifecycle event broadcast channel.
    pub bus_capacity: usize,
}

impl PipelineConfig {
    /// Worker thread count as an `Option` (`None` = runtime default).
    #[inline]
    pub fn worker_threads(&self) -> Option<usize> {
        if self.worker_threads == 0 {
            None
        } else {
            Some(self.worker_threads)
        }
    }

    #[inline]
    pub fn notification_capacity_clamped(&self) -> usize {
        self.notification_capacity.max(1)
    }

    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for PipelineConfig {
    /// Default configuration:
    ///
    /// - `worker_threads = 0` (one per CPU)
    /// - `thread_name = "pipevisor-worker"`
    /// - `notification_capacity = 256`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            worker_threads: 0,
            thread_name: "pipevisor-worker".to_string(),
            notification_capacity: 256,
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        let cfg = PipelineConfig {
            worker_threads: 0,
            notification_capacity: 0,
            bus_capacity: 0,
            ..PipelineConfig::default()
        };
        assert_eq!(cfg.worker_threads(), None);
        assert_eq!(cfg.notification_capacity_clamped(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);

        let cfg = PipelineConfig {
            worker_threads: 3,
            ..PipelineConfig::default()
        };
        assert_eq!(cfg.worker_threads(), Some(3));
    }
}
