//! # Pipeline status and exit information.
//!
//! ```text
//!            start() ok                 host stop()       host cancel()
//!   Idle ──────────────► Running ─────────► Stopped   ───► Canceled
//!    ▲                      │   plugin complete ──► Complete
//!    │ failed start         │   plugin abort    ──► Aborted
//!    └──────────────────────┘
//! ```
//!
//! A failed start always lands back on `Idle`; a terminal status is kept until the next
//! successful start.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Externally observable state of the pipeline.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStatus {
    /// Never started, or the last start attempt failed.
    Idle = 0,
    /// Data sources are running.
    Running = 1,
    /// Stopped by the host, after draining.
    Stopped = 2,
    /// Canceled by the host, without draining.
    Canceled = 3,
    /// A plugin aborted the pipeline.
    Aborted = 4,
    /// A plugin declared the work complete.
    Complete = 5,
}

impl PipelineStatus {
    pub fn as_label(&self) -> &'static str {
        match self {
            PipelineStatus::Idle => "idle",
            PipelineStatus::Running => "running",
            PipelineStatus::Stopped => "stopped",
            PipelineStatus::Canceled => "canceled",
            PipelineStatus::Aborted => "aborted",
            PipelineStatus::Complete => "complete",
        }
    }

    /// True for the statuses reached by a teardown.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineStatus::Idle | PipelineStatus::Running)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => PipelineStatus::Running,
            2 => PipelineStatus::Stopped,
            3 => PipelineStatus::Canceled,
            4 => PipelineStatus::Aborted,
            5 => PipelineStatus::Complete,
            _ => PipelineStatus::Idle,
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Lock-free cell holding a [`PipelineStatus`].
#[derive(Debug)]
pub(crate) struct AtomicStatus(AtomicU8);

impl AtomicStatus {
    pub(crate) fn new(status: PipelineStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    pub(crate) fn load(&self) -> PipelineStatus {
        PipelineStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, status: PipelineStatus) {
        self.0.store(status as u8, Ordering::Release);
    }

    /// Replaces `current` with `new`; returns `false` if the status was something else.
    pub(crate) fn transition(&self, current: PipelineStatus, new: PipelineStatus) -> bool {
        self.0
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Who ended the last run, and why.
///
/// Empty until a plugin completes or aborts the pipeline; cleared by the next start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitInfo {
    /// Id of the plugin that ended the run.
    pub origin: String,
    pub reason: String,
}

impl ExitInfo {
    pub fn is_empty(&self) -> bool {
        self.origin.is_empty() && self.reason.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_atomic() {
        let cell = AtomicStatus::new(PipelineStatus::Idle);
        for s in [
            PipelineStatus::Running,
            PipelineStatus::Stopped,
            PipelineStatus::Canceled,
            PipelineStatus::Aborted,
            PipelineStatus::Complete,
            PipelineStatus::Idle,
        ] {
            cell.store(s);
            assert_eq!(cell.load(), s);
        }
    }

    #[test]
    fn test_transition_requires_expected_status() {
        let cell = AtomicStatus::new(PipelineStatus::Idle);
        assert!(cell.transition(PipelineStatus::Idle, PipelineStatus::Running));
        assert!(!cell.transition(PipelineStatus::Idle, PipelineStatus::Aborted));
        assert_eq!(cell.load(), PipelineStatus::Running);
    }

    #[test]
    fn test_labels() {
        assert_eq!(PipelineStatus::Complete.to_string(), "complete");
        assert!(PipelineStatus::Canceled.is_terminal());
        assert!(!PipelineStatus::Running.is_terminal());
        assert!(ExitInfo::default().is_empty());
    }
}
