//! # PipelineManager: phased start, orderly teardown.
//!
//! The [`PipelineManager`] owns the plugins, the current [`DataNetwork`], the data sources
//! collected during init and the worker pool every network runs on.
//!
//! ## Start
//! ```text
//! start()
//!   ├─ reject: no plugins / already running / duplicate plugin ids
//!   ├─ register   : plugin.register_types(bound handle)          (fresh ChannelRegistry)
//!   ├─ init       : plugin.init(&registry, &network, &mut sources)
//!   ├─ control    : FunctionNode<ControlMessage> ─► ControlRouter (see control.rs)
//!   ├─ config push: network.finalize(); plugin.push_configs(); wait_for_completion();
//!   │               gate.wait_settled(); status != Idle ─► fail with exit info
//!   ├─ run        : gate.defer(); source.start() in order
//!   └─ running    : Idle ─► Running under the stop lock (fails if a plugin got there first)
//!
//! any failure ─► dismantle(Cancel) ─► status Idle, exit info cleared, fresh network
//! ```
//!
//! ## Teardown
//! ```text
//! stop()/cancel()/plugin complete/plugin abort
//!   └─► teardown(mode, status)        (no-op unless running; plugin requests must
//!         │                             come from the current run)
//!         ├─ stop started sources
//!         ├─ network: drain (Drain) or cancel (Cancel)
//!         ├─ plugin.deinit(&network, canceled) in reverse init order
//!         ├─ sources cleared, fresh network
//!         ├─ status = stopped | canceled | complete | aborted
//!         └─ stopped = true ─► wake wait_for_stop()
//! ```
//!
//! Plugin-initiated teardowns run on the control thread, never on a graph job.

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use parking_lot::{Condvar, Mutex};
use tokio::sync::broadcast;

use crate::error::{Outcome, PipelineError};
use crate::events::{Bus, EventKind, Phase, PipelineEvent};
use crate::network::{Concurrency, DataNetwork, FunctionNode};
use crate::plugin::{Plugin, PluginId};
use crate::registry::ChannelRegistry;
use crate::sources::DataSourceList;

use super::builder::PipelineBuilder;
use super::config::PipelineConfig;
use super::control::{
    Command, ControlActor, ControlGate, ControlRouter, Ending, ShutdownRequest,
};
use super::message::ControlMessage;
use super::notifier::{NotificationCallback, Notifier, NotifierHandle};
use super::pool::WorkerPool;
use super::status::{AtomicStatus, ExitInfo, PipelineStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Teardown {
    Drain,
    Cancel,
}

/// Everything a run is made of. Guarded by one lock held for whole phases.
struct RunState {
    plugins: Vec<Box<dyn Plugin>>,
    network: DataNetwork,
    sources: DataSourceList,
    /// Plugins whose `init` was called, counted from the front.
    initialized: usize,
    /// Sources whose `start` succeeded, counted from the front.
    started: usize,
}

/// A plugin's request to end the run, with the gate of the run that raised it.
#[derive(Clone, Copy)]
struct PluginExit<'a> {
    request: &'a ShutdownRequest,
    gate: &'a Arc<ControlGate>,
}

/// A failed start: phase, plugin at fault (if known) and accumulated text.
struct StartFailure {
    phase: Phase,
    plugin: Option<PluginId>,
    outcome: Outcome,
}

impl StartFailure {
    fn new(phase: Phase, plugin: Option<PluginId>, outcome: Outcome) -> Self {
        Self {
            phase,
            plugin,
            outcome,
        }
    }
}

struct Shared {
    run: Mutex<RunState>,
    stopped: Mutex<bool>,
    stopped_cv: Condvar,
    status: AtomicStatus,
    exit: Mutex<ExitInfo>,
    /// Gate of the start attempt or run in progress; `None` while idle.
    current_gate: Mutex<Option<Arc<ControlGate>>>,
    commands: Sender<Command>,
    notifier: NotifierHandle,
    bus: Bus,
    /// Declared last: networks above must go before the runtime they run on.
    pool: WorkerPool,
}

impl Shared {
    fn bring_up(&self, run: &mut RunState, gate: &Arc<ControlGate>) -> Result<(), StartFailure> {
        let RunState {
            plugins,
            network,
            sources,
            initialized,
            started,
        } = run;

        let mut registry = ChannelRegistry::new();
        for plugin in plugins.iter_mut() {
            let id = PluginId::from(plugin.id());
            let out = plugin.register_types(&mut registry.bind(Arc::clone(&id)));
            if out.is_failure() {
                let out = out.with_context(format!("plugin {id} failed to register its types"));
                return Err(StartFailure::new(Phase::Register, Some(id), out));
            }
        }
        self.phase_completed(Phase::Register);

        for plugin in plugins.iter_mut() {
            let id = PluginId::from(plugin.id());
            sources.set_owner(Some(Arc::clone(&id)));
            *initialized += 1;
            let out = plugin.init(&registry, network, sources);
            if out.is_failure() {
                let out = out.with_context(format!("plugin {id} failed to initialize"));
                return Err(StartFailure::new(Phase::Init, Some(id), out));
            }
        }
        sources.set_owner(None);

        let router = ControlRouter::new(
            Arc::clone(gate),
            self.commands.clone(),
            self.notifier.clone(),
        );
        let sink = FunctionNode::new(
            network.graph(),
            Concurrency::Serial,
            move |message: ControlMessage| router.route(message),
        );
        if let Err(err) = network.add_sink_node::<ControlMessage, _>(sink) {
            let out = Outcome::from(err).with_context("unable to add pipeline control node");
            return Err(StartFailure::new(Phase::Init, None, out));
        }
        self.phase_completed(Phase::Init);

        network.finalize();
        for plugin in plugins.iter_mut() {
            let out = plugin.push_configs(network);
            if out.is_failure() {
                let id = PluginId::from(plugin.id());
                let out = out.with_context(format!("plugin {id} was unable to push its configs"));
                return Err(StartFailure::new(Phase::ConfigPush, Some(id), out));
            }
        }
        network.wait_for_completion();
        gate.wait_settled();
        if let Some((origin, out)) = self.abnormal_exit() {
            let out = out
                .with_context("pipeline error occurred during plugin configuration exchange stage");
            return Err(StartFailure::new(Phase::ConfigPush, origin, out));
        }
        self.phase_completed(Phase::ConfigPush);

        gate.defer();
        for index in 0..sources.len() {
            let owner = sources.owner_of(index).map(PluginId::from);
            let Some(source) = sources.get_mut(index) else {
                break;
            };
            let out = source.start();
            if out.is_failure() {
                let out = out.with_context(format!(
                    "data source {index} of plugin {} failed to start",
                    owner.as_deref().unwrap_or("<unknown>")
                ));
                return Err(StartFailure::new(Phase::Run, owner, out));
            }
            *started += 1;
        }

        let mut stopped = self.stopped.lock();
        if !self.status.transition(PipelineStatus::Idle, PipelineStatus::Running) {
            drop(stopped);
            let (origin, out) = self.abnormal_exit().unwrap_or_else(|| {
                (None, Outcome::failure("pipeline status changed while starting"))
            });
            return Err(StartFailure::new(Phase::Run, origin, out));
        }
        *stopped = false;
        Ok(())
    }

    /// Failure text for a plugin-initiated exit recorded while starting.
    fn abnormal_exit(&self) -> Option<(Option<PluginId>, Outcome)> {
        if self.status.load() == PipelineStatus::Idle {
            return None;
        }
        let exit = self.exit.lock().clone();
        let out = Outcome::failure(exit.reason)
            .with_context(format!("plugin {} ended pipeline execution", exit.origin));
        Some((Some(PluginId::from(exit.origin)), out))
    }

    /// Stops sources, drains or cancels the network, deinits plugins and rebuilds.
    fn dismantle(&self, run: &mut RunState, mode: Teardown) {
        let canceled = mode == Teardown::Cancel;

        for index in 0..run.started {
            if let Some(source) = run.sources.get_mut(index) {
                let out = source.stop();
                if out.is_failure() {
                    tracing::warn!(source = index, error = %out, "data source failed to stop");
                }
            }
        }

        match mode {
            Teardown::Drain => run.network.wait_for_completion(),
            Teardown::Cancel => run.network.cancel(),
        }

        let initialized = run.initialized.min(run.plugins.len());
        for plugin in run.plugins[..initialized].iter_mut().rev() {
            let out = plugin.deinit(&run.network, canceled);
            if out.is_failure() {
                tracing::warn!(plugin = plugin.id(), error = %out, "plugin failed to deinitialize");
            }
        }
        if !canceled {
            run.network.wait_for_completion();
        }
        run.network.cancel();

        run.sources.clear();
        run.started = 0;
        run.initialized = 0;
        run.network = DataNetwork::new(self.pool.handle());
    }

    fn is_current(&self, gate: &Arc<ControlGate>) -> bool {
        self.current_gate
            .lock()
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, gate))
    }

    /// Ends a running pipeline. Returns `false` if nothing was running, or if `by` comes
    /// from a run that already ended.
    fn teardown(&self, mode: Teardown, status: PipelineStatus, by: Option<PluginExit<'_>>) -> bool {
        let mut run = self.run.lock();
        if *self.stopped.lock() {
            return false;
        }
        if let Some(by) = by {
            if !self.is_current(by.gate) {
                tracing::debug!(
                    origin = %by.request.origin,
                    "shutdown request from an earlier run dropped"
                );
                return false;
            }
            self.shutdown_requested(by.request, status);
        }
        tracing::info!(status = %status, mode = ?mode, "stopping pipeline");

        self.dismantle(&mut run, mode);

        *self.current_gate.lock() = None;
        self.status.store(status);
        if let Some(by) = by {
            *self.exit.lock() = ExitInfo {
                origin: by.request.origin.to_string(),
                reason: by.request.reason.clone(),
            };
        }
        *self.stopped.lock() = true;
        self.stopped_cv.notify_all();
        drop(run);

        tracing::info!(status = %status, "pipeline stopped");
        self.bus
            .publish(PipelineEvent::new(EventKind::Stopped).with_status(status));
        true
    }

    /// Runs on the control thread for every claimed `Abort`/`Complete`.
    fn handle_control(&self, request: ShutdownRequest, gate: &Arc<ControlGate>) {
        let (status, mode) = match request.ending {
            Ending::Complete => (PipelineStatus::Complete, Teardown::Drain),
            Ending::Abort => (PipelineStatus::Aborted, Teardown::Cancel),
        };

        {
            let stopped = self.stopped.lock();
            if *stopped && !gate.is_deferred() {
                // Before the run phase: record it, start() turns it into a failure.
                let current = self.current_gate.lock();
                if !current.as_ref().is_some_and(|c| Arc::ptr_eq(c, gate)) {
                    tracing::debug!(
                        origin = %request.origin,
                        "shutdown request from an earlier start attempt dropped"
                    );
                    return;
                }
                if self.status.transition(PipelineStatus::Idle, status) {
                    *self.exit.lock() = ExitInfo {
                        origin: request.origin.to_string(),
                        reason: request.reason.clone(),
                    };
                    self.shutdown_requested(&request, status);
                }
                return;
            }
        }
        // Running, or about to be: teardown waits for start() to let go of the run state.
        self.teardown(mode, status, Some(PluginExit { request: &request, gate }));
    }

    fn shutdown_requested(&self, request: &ShutdownRequest, status: PipelineStatus) {
        tracing::info!(
            origin = %request.origin,
            reason = %request.reason,
            status = %status,
            "plugin requested pipeline shutdown"
        );
        self.bus.publish(
            PipelineEvent::new(EventKind::ShutdownRequested)
                .with_plugin(Arc::clone(&request.origin))
                .with_reason(request.reason.as_str())
                .with_status(status),
        );
    }

    fn phase_completed(&self, phase: Phase) {
        tracing::debug!(phase = %phase, "start phase completed");
        self.bus
            .publish(PipelineEvent::new(EventKind::PhaseCompleted).with_phase(phase));
    }
}

/// Hosts a set of plugins and runs them as one pipeline.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use pipevisor::{PipelineBuilder, PipelineConfig, PipelineStatus, Plugin};
///
/// fn run(plugins: Vec<Box<dyn Plugin>>) -> std::io::Result<()> {
///     let manager = PipelineBuilder::new(PipelineConfig::default())
///         .with_plugins(plugins)
///         .with_notification_callback(|text| println!("{text}"))
///         .build()?;
///
///     let started = manager.start();
///     if started.is_failure() {
///         eprintln!("{started}");
///         return Ok(());
///     }
///     if manager.wait_for_stop(Duration::from_secs(30)) == PipelineStatus::Running {
///         manager.stop();
///     }
///     Ok(())
/// }
/// ```
pub struct PipelineManager {
    shared: Arc<Shared>,
    actor: ControlActor,
    notifier: Notifier,
}

impl PipelineManager {
    /// Creates a manager with the default configuration.
    pub fn new(plugins: Vec<Box<dyn Plugin>>) -> io::Result<Self> {
        PipelineBuilder::new(PipelineConfig::default())
            .with_plugins(plugins)
            .build()
    }

    pub fn builder(cfg: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: PipelineConfig,
        plugins: Vec<Box<dyn Plugin>>,
        callback: Option<NotificationCallback>,
    ) -> io::Result<Self> {
        let pool = WorkerPool::new(&cfg)?;
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let notifier = Notifier::spawn(cfg.notification_capacity_clamped(), bus.clone())?;
        if let Some(callback) = callback {
            notifier.set_callback(callback);
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        let network = DataNetwork::new(pool.handle());
        let shared = Arc::new(Shared {
            run: Mutex::new(RunState {
                plugins,
                network,
                sources: DataSourceList::new(),
                initialized: 0,
                started: 0,
            }),
            stopped: Mutex::new(true),
            stopped_cv: Condvar::new(),
            status: AtomicStatus::new(PipelineStatus::Idle),
            exit: Mutex::new(ExitInfo::default()),
            current_gate: Mutex::new(None),
            commands: tx.clone(),
            notifier: notifier.handle(),
            bus,
            pool,
        });
        let actor = {
            let shared = Arc::clone(&shared);
            ControlActor::spawn(tx, rx, move |request, gate| {
                shared.handle_control(request, gate)
            })?
        };

        Ok(Self {
            shared,
            actor,
            notifier,
        })
    }

    /// Runs every start phase; on failure the manager is back to idle and can be
    /// started again.
    pub fn start(&self) -> Outcome {
        let shared = &*self.shared;
        let mut guard = shared.run.lock();
        let run = &mut *guard;

        if run.plugins.is_empty() {
            tracing::warn!("start rejected: no plugins");
            return PipelineError::NoPlugins.into();
        }
        if !*shared.stopped.lock() {
            return PipelineError::AlreadyRunning.into();
        }
        let duplicate = {
            let mut ids = HashSet::new();
            run.plugins
                .iter()
                .map(|p| p.id())
                .find(|id| !ids.insert(*id))
                .map(str::to_string)
        };
        if let Some(dup) = duplicate {
            return Outcome::failure(format!("plugin id {dup} is used by more than one plugin"));
        }

        shared.status.store(PipelineStatus::Idle);
        *shared.exit.lock() = ExitInfo::default();
        tracing::info!(plugins = run.plugins.len(), "starting pipeline");
        shared
            .bus
            .publish(PipelineEvent::new(EventKind::StartRequested));

        let gate = ControlGate::new();
        *shared.current_gate.lock() = Some(Arc::clone(&gate));
        match shared.bring_up(run, &gate) {
            Ok(()) => {
                tracing::info!(sources = run.started, "pipeline running");
                shared
                    .bus
                    .publish(PipelineEvent::new(EventKind::Running).with_status(PipelineStatus::Running));
                Outcome::success()
            }
            Err(failure) => {
                shared.dismantle(run, Teardown::Cancel);
                // Cleared first: a request still in flight for this attempt is then dropped.
                *shared.current_gate.lock() = None;
                shared.status.store(PipelineStatus::Idle);
                *shared.exit.lock() = ExitInfo::default();

                tracing::error!(
                    phase = %failure.phase,
                    plugin = failure.plugin.as_deref(),
                    error = %failure.outcome,
                    "pipeline failed to start"
                );
                let mut ev = PipelineEvent::new(EventKind::StartFailed)
                    .with_phase(failure.phase)
                    .with_reason(failure.outcome.to_string());
                if let Some(plugin) = failure.plugin {
                    ev = ev.with_plugin(plugin);
                }
                shared.bus.publish(ev);
                failure.outcome
            }
        }
    }

    /// Stops data sources, drains the network and marks the pipeline `stopped`.
    ///
    /// Returns `false` (and changes nothing) if the pipeline was not running.
    pub fn stop(&self) -> bool {
        self.shared
            .teardown(Teardown::Drain, PipelineStatus::Stopped, None)
    }

    /// Stops data sources, cancels outstanding work and marks the pipeline `canceled`.
    ///
    /// Returns `false` (and changes nothing) if the pipeline was not running.
    pub fn cancel(&self) -> bool {
        self.shared
            .teardown(Teardown::Cancel, PipelineStatus::Canceled, None)
    }

    /// Blocks until the pipeline is not running or `timeout` elapsed
    /// (`Duration::ZERO` waits forever), then returns the current status.
    pub fn wait_for_stop(&self, timeout: Duration) -> PipelineStatus {
        let shared = &*self.shared;
        let mut stopped = shared.stopped.lock();
        if timeout.is_zero() {
            while !*stopped {
                shared.stopped_cv.wait(&mut stopped);
            }
        } else {
            let deadline = Instant::now() + timeout;
            while !*stopped {
                if shared.stopped_cv.wait_until(&mut stopped, deadline).timed_out() {
                    break;
                }
            }
        }
        drop(stopped);
        self.status()
    }

    #[inline]
    pub fn status(&self) -> PipelineStatus {
        self.shared.status.load()
    }

    pub fn is_running(&self) -> bool {
        !*self.shared.stopped.lock()
    }

    /// Origin and reason of the last plugin-initiated stop.
    pub fn exit_info(&self) -> ExitInfo {
        self.shared.exit.lock().clone()
    }

    /// Sets the callback receiving plugin notifications. Returns `false` for `None`.
    pub fn set_notification_callback(&self, callback: Option<NotificationCallback>) -> bool {
        match callback {
            Some(callback) => {
                self.notifier.set_callback(callback);
                true
            }
            None => false,
        }
    }

    /// Receiver of lifecycle events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.shared.bus.subscribe()
    }

    /// Ids of the hosted plugins, in start order.
    ///
    /// Blocks while a start or teardown is in progress.
    pub fn plugin_ids(&self) -> Vec<String> {
        self.shared
            .run
            .lock()
            .plugins
            .iter()
            .map(|p| p.id().to_string())
            .collect()
    }
}

impl fmt::Debug for PipelineManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineManager")
            .field("status", &self.status())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for PipelineManager {
    fn drop(&mut self) {
        self.shared
            .teardown(Teardown::Cancel, PipelineStatus::Canceled, None);
        self.actor.shutdown();
        self.notifier.shutdown();
    }
}
