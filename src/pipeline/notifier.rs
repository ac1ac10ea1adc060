//! # Notifier: delivers plugin notifications to the host callback.
//!
//! Notifications are raised from graph jobs, so they are never delivered inline: the
//! control sink hands them to a bounded queue drained by one dedicated thread.
//!
//! ```text
//!  control sink (graph job) ──try_send──► [bounded queue] ──► notifier thread ──► callback(text)
//!                                 │ full
//!                                 └──► dropped + warn + NotificationDropped event
//! ```
//!
//! ## Rules
//! - `emit` never blocks.
//! - Per-manager FIFO delivery.
//! - A panicking callback is caught and logged; later notifications are still delivered.
//! - The callback can be swapped at any time; each notification uses the one current at
//!   delivery time.

use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::RwLock;

use crate::events::{Bus, EventKind, PipelineEvent};
use crate::network::panic_message;
use crate::plugin::PluginId;

/// Host callback receiving plugin notification text.
pub type NotificationCallback = Arc<dyn Fn(&str) + Send + Sync>;

type CallbackSlot = Arc<RwLock<Option<NotificationCallback>>>;

enum Notice {
    Deliver { origin: PluginId, text: String },
    Exit,
}

/// Cloneable sending side of the notifier.
#[derive(Clone)]
pub(crate) struct NotifierHandle {
    tx: Sender<Notice>,
    bus: Bus,
}

impl NotifierHandle {
    /// Queues `text` for delivery. Returns `false` if it was dropped.
    pub(crate) fn emit(&self, origin: PluginId, text: String) -> bool {
        match self.tx.try_send(Notice::Deliver {
            origin: Arc::clone(&origin),
            text,
        }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(origin = %origin, "notification dropped: queue full");
                self.bus
                    .publish(PipelineEvent::new(EventKind::NotificationDropped).with_plugin(origin));
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!(origin = %origin, "notification dropped: notifier closed");
                false
            }
        }
    }
}

/// Owns the notifier thread.
pub(crate) struct Notifier {
    handle: NotifierHandle,
    callback: CallbackSlot,
    worker: Option<JoinHandle<()>>,
}

impl Notifier {
    pub(crate) fn spawn(capacity: usize, bus: Bus) -> io::Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        let callback: CallbackSlot = Arc::new(RwLock::new(None));
        let worker = {
            let callback = Arc::clone(&callback);
            let bus = bus.clone();
            std::thread::Builder::new()
                .name("pipevisor-notifier".into())
                .spawn(move || Self::deliver(rx, callback, bus))?
        };
        Ok(Self {
            handle: NotifierHandle { tx, bus },
            callback,
            worker: Some(worker),
        })
    }

    pub(crate) fn handle(&self) -> NotifierHandle {
        self.handle.clone()
    }

    pub(crate) fn set_callback(&self, callback: NotificationCallback) {
        *self.callback.write() = Some(callback);
    }

    /// Delivers what is already queued, then stops the thread.
    pub(crate) fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.handle.tx.send(Notice::Exit);
            if worker.join().is_err() {
                tracing::error!("notifier thread panicked");
            }
        }
    }

    fn deliver(rx: Receiver<Notice>, callback: CallbackSlot, bus: Bus) {
        for notice in rx.iter() {
            let (origin, text) = match notice {
                Notice::Deliver { origin, text } => (origin, text),
                Notice::Exit => break,
            };
            bus.publish(
                PipelineEvent::new(EventKind::Notification)
                    .with_plugin(Arc::clone(&origin))
                    .with_reason(text.as_str()),
            );
            let current = callback.read().clone();
            let Some(cb) = current else {
                tracing::debug!(origin = %origin, "notification without callback");
                continue;
            };
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| cb(&text))) {
                tracing::error!(
                    origin = %origin,
                    reason = panic_message(panic.as_ref()),
                    "notification callback panicked"
                );
            }
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_delivers_in_order_to_current_callback() {
        let mut notifier = Notifier::spawn(16, Bus::new(16)).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            notifier.set_callback(Arc::new(move |text: &str| seen.lock().push(text.to_string())));
        }

        let handle = notifier.handle();
        assert!(handle.emit(PluginId::from("a"), "one".into()));
        assert!(handle.emit(PluginId::from("a"), "two".into()));
        notifier.shutdown();

        assert_eq!(*seen.lock(), vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_panicking_callback_does_not_stop_delivery() {
        let mut notifier = Notifier::spawn(16, Bus::new(16)).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            notifier.set_callback(Arc::new(move |text: &str| {
                if text == "bad" {
                    panic!("callback failure");
                }
                seen.lock().push(text.to_string());
            }));
        }

        let handle = notifier.handle();
        handle.emit(PluginId::from("a"), "bad".into());
        handle.emit(PluginId::from("a"), "good".into());
        notifier.shutdown();

        assert_eq!(*seen.lock(), vec!["good".to_string()]);
    }

    #[test]
    fn test_full_queue_drops_and_reports() {
        let bus = Bus::new(16);
        let mut events = bus.subscribe();
        let mut notifier = Notifier::spawn(1, bus).unwrap();
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let (entered_tx, entered_rx) = crossbeam_channel::bounded::<()>(1);
        notifier.set_callback(Arc::new(move |_: &str| {
            let _ = entered_tx.try_send(());
            let _ = release_rx.recv();
        }));

        let handle = notifier.handle();
        assert!(handle.emit(PluginId::from("a"), "blocking".into()));
        entered_rx.recv().unwrap();
        assert!(handle.emit(PluginId::from("a"), "queued".into()));
        assert!(!handle.emit(PluginId::from("a"), "dropped".into()));

        let dropped = std::iter::from_fn(|| events.try_recv().ok())
            .any(|ev| ev.kind == EventKind::NotificationDropped);
        assert!(dropped);

        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        notifier.shutdown();
    }
}
