//! # Lifecycle events emitted by the pipeline manager.
//!
//! The [`EventKind`] enum classifies events across three groups:
//! - **Start events**: a start attempt and its phases (requested, phase completed, failed, running)
//! - **Stop events**: shutdown requests from plugins or the host, and the final stop
//! - **Notification events**: plugin notifications, delivered or dropped
//!
//! The [`PipelineEvent`] struct carries metadata such as the phase, the plugin involved,
//! a reason and the status reached.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use pipevisor::{EventKind, Phase, PipelineEvent};
//!
//! let ev = PipelineEvent::new(EventKind::StartFailed)
//!     .with_phase(Phase::Init)
//!     .with_plugin("reporter")
//!     .with_reason("missing dependency");
//!
//! assert_eq!(ev.kind, EventKind::StartFailed);
//! assert_eq!(ev.plugin.as_deref(), Some("reporter"));
//! assert_eq!(ev.phase, Some(Phase::Init));
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::pipeline::PipelineStatus;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Start events ===
    /// `start()` accepted a new attempt.
    StartRequested,

    /// One start phase finished for every plugin.
    ///
    /// Sets:
    /// - `phase`: the phase that completed
    PhaseCompleted,

    /// The start attempt failed and was unwound.
    ///
    /// Sets:
    /// - `phase`: phase that failed
    /// - `plugin`: plugin at fault, when known
    /// - `reason`: failure text
    StartFailed,

    /// Data sources are running.
    Running,

    // === Stop events ===
    /// A plugin asked for the pipeline to complete or abort.
    ///
    /// Sets:
    /// - `plugin`: origin of the request
    /// - `reason`: reason given
    /// - `status`: status the request leads to
    ShutdownRequested,

    /// The pipeline stopped.
    ///
    /// Sets:
    /// - `status`: final status
    Stopped,

    // === Notification events ===
    /// A plugin notification was handed to the notifier.
    ///
    /// Sets:
    /// - `plugin`: origin
    /// - `reason`: notification text
    Notification,

    /// A plugin notification was dropped because the notifier queue was full.
    ///
    /// Sets:
    /// - `plugin`: origin
    NotificationDropped,
}

/// Start phase an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Register,
    Init,
    ConfigPush,
    Run,
}

impl Phase {
    pub fn as_label(&self) -> &'static str {
        match self {
            Phase::Register => "register",
            Phase::Init => "init",
            Phase::ConfigPush => "config_push",
            Phase::Run => "run",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct PipelineEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    pub phase: Option<Phase>,
    /// Plugin involved, if any.
    pub plugin: Option<Arc<str>>,
    /// Human-readable reason (failure text, notification text).
    pub reason: Option<Arc<str>>,
    pub status: Option<PipelineStatus>,
}

impl PipelineEvent {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            phase: None,
            plugin: None,
            reason: None,
            status: None,
        }
    }

    #[inline]
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    #[inline]
    pub fn with_plugin(mut self, plugin: impl Into<Arc<str>>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_status(mut self, status: PipelineStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = PipelineEvent::new(EventKind::StartRequested);
        let b = PipelineEvent::new(EventKind::Running);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builders_set_fields() {
        let ev = PipelineEvent::new(EventKind::Stopped).with_status(PipelineStatus::Aborted);
        assert_eq!(ev.status, Some(PipelineStatus::Aborted));
        assert!(ev.plugin.is_none());
        assert_eq!(Phase::ConfigPush.to_string(), "config_push");
    }
}
