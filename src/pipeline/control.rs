//! # Control path: from the control sink to the control thread.
//!
//! The control sink runs inside the graph. Draining or cancelling the graph from there
//! would wait on the very job doing the waiting, so the sink only routes:
//!
//! ```text
//!  ControlMessage ──► control sink (graph job) ── ControlRouter::route
//!                          │
//!          Notify ─────────┼──► NotifierHandle::emit ──► notifier thread
//!                          │
//!  Abort/Complete ──► gate.try_claim()
//!                     ├─ won  ──► Command::Shutdown ──► control thread ──► handler(request)
//!                     │                                                     └─► gate.settle()
//!                     └─ lost ──► dropped (first signal wins)
//! ```
//!
//! ## Rules
//! - One [`ControlGate`] per start attempt; at most one shutdown per gate.
//! - Before the run phase a shutdown is only recorded; from the run phase on it is
//!   deferred until `start()` returned (see [`ControlGate::defer`]).
//! - The gate settles after the handler returned, even if it panicked.
//! - `Notify` never touches the gate and never reaches the control thread.
//! - The handler receives the gate of the run that raised the request; it must drop the
//!   request if that run is gone.

use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::network::panic_message;
use crate::sources::Completion;

use crate::plugin::PluginId;

use super::message::{ControlKind, ControlMessage};
use super::notifier::NotifierHandle;

/// Single shutdown slot of one start attempt.
#[derive(Default)]
pub(crate) struct ControlGate {
    claimed: AtomicBool,
    deferred: AtomicBool,
    settled: Completion,
}

impl ControlGate {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claims the slot; `false` if a shutdown was already claimed.
    pub(crate) fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Marks the start of the run phase.
    pub(crate) fn defer(&self) {
        self.deferred.store(true, Ordering::Release);
    }

    /// True once the start attempt reached its run phase.
    pub(crate) fn is_deferred(&self) -> bool {
        self.deferred.load(Ordering::Acquire)
    }

    pub(crate) fn settle(&self) {
        self.settled.finish();
    }

    /// Waits for the claimed shutdown (if any) to be handled.
    pub(crate) fn wait_settled(&self) {
        if self.claimed.load(Ordering::Acquire) {
            self.settled.wait();
        }
    }
}

struct SettleOnDrop<'a>(&'a ControlGate);

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.settle();
    }
}

/// How a plugin asked the run to end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Ending {
    Complete,
    Abort,
}

/// A claimed `Complete`/`Abort`, as handed to the control thread.
#[derive(Clone, Debug)]
pub(crate) struct ShutdownRequest {
    pub(crate) ending: Ending,
    pub(crate) origin: PluginId,
    pub(crate) reason: String,
}

pub(crate) enum Command {
    Shutdown {
        request: ShutdownRequest,
        gate: Arc<ControlGate>,
    },
    Exit,
}

/// Body of the control sink node.
pub(crate) struct ControlRouter {
    gate: Arc<ControlGate>,
    commands: Sender<Command>,
    notifier: NotifierHandle,
}

impl ControlRouter {
    pub(crate) fn new(
        gate: Arc<ControlGate>,
        commands: Sender<Command>,
        notifier: NotifierHandle,
    ) -> Self {
        Self {
            gate,
            commands,
            notifier,
        }
    }

    pub(crate) fn route(&self, message: ControlMessage) {
        let ending = match message.kind {
            ControlKind::Notify => {
                self.notifier.emit(message.origin, message.reason);
                return;
            }
            ControlKind::Complete => Ending::Complete,
            ControlKind::Abort => Ending::Abort,
        };
        if !self.gate.try_claim() {
            tracing::debug!(
                origin = %message.origin,
                kind = ?message.kind,
                "shutdown already in progress, control message dropped"
            );
            return;
        }
        let command = Command::Shutdown {
            request: ShutdownRequest {
                ending,
                origin: message.origin,
                reason: message.reason,
            },
            gate: Arc::clone(&self.gate),
        };
        if self.commands.send(command).is_err() {
            tracing::warn!("control thread is gone, shutdown request lost");
            self.gate.settle();
        }
    }
}

/// Owns the control thread.
pub(crate) struct ControlActor {
    commands: Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl ControlActor {
    /// Spawns the thread handling shutdown commands with `handler`.
    pub(crate) fn spawn<H>(
        commands: Sender<Command>,
        rx: Receiver<Command>,
        mut handler: H,
    ) -> io::Result<Self>
    where
        H: FnMut(ShutdownRequest, &Arc<ControlGate>) + Send + 'static,
    {
        let worker = std::thread::Builder::new()
            .name("pipevisor-control".into())
            .spawn(move || {
                for command in rx.iter() {
                    let (request, gate) = match command {
                        Command::Shutdown { request, gate } => (request, gate),
                        Command::Exit => break,
                    };
                    let _settle = SettleOnDrop(&gate);
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(request, &gate))) {
                        tracing::error!(
                            reason = panic_message(panic.as_ref()),
                            "control handler panicked"
                        );
                    }
                }
            })?;
        Ok(Self {
            commands,
            worker: Some(worker),
        })
    }

    /// Stops the thread after the commands already queued.
    pub(crate) fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.commands.send(Command::Exit);
            if worker.join().is_err() {
                tracing::error!("control thread panicked");
            }
        }
    }
}

impl Drop for ControlActor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
