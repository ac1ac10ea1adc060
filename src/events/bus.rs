//! # Event bus for broadcasting lifecycle events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. The manager, its control
//! thread and its notifier publish; the host subscribes through
//! [`PipelineManager::subscribe`](crate::PipelineManager::subscribe).
//!
//! ```text
//!   start()/stop() ──┐
//!   control thread ──┼──────► Bus ───────► host receivers
//!   notifier       ──┘  (broadcast chan)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; it calls `broadcast::Sender::send`.
//! - **Bounded capacity**: a single ring buffer stores recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if there are no active subscribers at send time.
//!
//! Receivers can be polled from synchronous code with `try_recv()` or `blocking_recv()`.

use tokio::sync::broadcast;

use super::event::PipelineEvent;

/// Broadcast channel for lifecycle events.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<PipelineEvent>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// Events are also mirrored to `tracing` at debug level.
    pub fn publish(&self, ev: PipelineEvent) {
        tracing::debug!(
            seq = ev.seq,
            kind = ?ev.kind,
            phase = ev.phase.map(|p| p.as_label()),
            plugin = ev.plugin.as_deref(),
            reason = ev.reason.as_deref(),
            status = ev.status.map(|s| s.as_label()),
            "pipeline event"
        );
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that will observe subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[test]
    fn test_subscriber_sees_only_later_events() {
        let bus = Bus::new(0);
        bus.publish(PipelineEvent::new(EventKind::StartRequested));

        let mut rx = bus.subscribe();
        bus.publish(PipelineEvent::new(EventKind::Running));

        assert_eq!(rx.try_recv().unwrap().kind, EventKind::Running);
        assert!(rx.try_recv().is_err());
    }
}
