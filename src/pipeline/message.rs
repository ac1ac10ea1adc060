//! # Control messages plugins send to the manager.
//!
//! Plugins push a [`ControlMessage`] into the network like any other payload; the manager
//! wires a sink for it during every start.
//!
//! | Kind       | Effect                                             |
//! |------------|----------------------------------------------------|
//! | `Complete` | drain and stop, status `complete`                  |
//! | `Abort`    | cancel and stop, status `aborted`                  |
//! | `Notify`   | forward `reason` to the host notification callback |
//!
//! Only the first `Complete`/`Abort` of a run has an effect; later ones are dropped.

use crate::plugin::PluginId;
use crate::types::families::PIPELINE;

/// What a [`ControlMessage`] asks the manager to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Abort,
    Complete,
    Notify,
}

/// Message from a plugin to the pipeline manager.
///
/// # Example
/// ```no_run
/// # use pipevisor::{ControlMessage, DataNetwork};
/// # fn finish(network: &DataNetwork) {
/// let _ = network.push(ControlMessage::complete("replayer", "end of recording"));
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage {
    pub kind: ControlKind,
    /// Id of the sending plugin.
    pub origin: PluginId,
    pub reason: String,
}

impl ControlMessage {
    pub fn new(kind: ControlKind, origin: impl Into<PluginId>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub fn abort(origin: impl Into<PluginId>, reason: impl Into<String>) -> Self {
        Self::new(ControlKind::Abort, origin, reason)
    }

    pub fn complete(origin: impl Into<PluginId>, reason: impl Into<String>) -> Self {
        Self::new(ControlKind::Complete, origin, reason)
    }

    pub fn notify(origin: impl Into<PluginId>, text: impl Into<String>) -> Self {
        Self::new(ControlKind::Notify, origin, text)
    }

    /// True for messages that end the run.
    pub fn ends_run(&self) -> bool {
        matches!(self.kind, ControlKind::Abort | ControlKind::Complete)
    }
}

crate::payload_types!(PIPELINE => {
    ControlMessage = 0,
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Payload;

    #[test]
    fn test_constructors() {
        let m = ControlMessage::abort("monitor", "device lost");
        assert_eq!(m.kind, ControlKind::Abort);
        assert_eq!(&*m.origin, "monitor");
        assert!(m.ends_run());
        assert!(!ControlMessage::notify("monitor", "hello").ends_run());
    }

    #[test]
    fn test_tag_lives_in_pipeline_family() {
        assert!(PIPELINE.contains(<ControlMessage as Payload>::TAG));
    }
}
