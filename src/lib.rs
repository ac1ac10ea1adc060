//! # pipevisor
//!
//! **Pipevisor** hosts a set of plugins and runs them as one typed dataflow pipeline.
//!
//! Plugins declare the payload types they produce and consume, wire processing nodes into
//! a [`DataNetwork`] and hand back [`DataSource`]s. The [`PipelineManager`] brings the
//! plugins up in phases, runs the sources, and tears everything down when the host or a
//! plugin asks for it.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Plugin A   │   │   Plugin B   │   │   Plugin C   │
//!     │  (sources)   │   │ (transform)  │   │   (sinks)    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  PipelineManager                                                  │
//! │  - ChannelRegistry (who produces/consumes what, per start)        │
//! │  - DataNetwork     (one channel per payload type, per run)        │
//! │  - DataSourceList  (what feeds the network)                       │
//! │  - WorkerPool      (tokio runtime running node work)              │
//! │  - control thread + notifier thread                               │
//! └──────┬────────────────────────────────────────────────────┬───────┘
//!        ▼                                                    ▼
//!   DataNetwork                                          Bus (events)
//!   source ──► channel<T> ──► sink                       StartRequested, Running,
//!   source ──► channel<U> ──► sink, sink                 Stopped, Notification, ...
//!              channel<ControlMessage> ──► control sink ──► control thread
//! ```
//!
//! ### Lifecycle
//! ```text
//! start():  register_types ─► init ─► [control sink] ─► finalize ─► push_configs
//!           ─► drain ─► sources.start ─► Running
//!
//! Running ─► stop()                 ─► Stopped   (drain)
//!         ─► cancel()               ─► Canceled  (cancel)
//!         ─► ControlMessage::complete ─► Complete  (drain)
//!         ─► ControlMessage::abort    ─► Aborted   (cancel)
//! ```
//!
//! ## Features
//! | Area              | Description                                            | Key types / traits                          |
//! |-------------------|--------------------------------------------------------|---------------------------------------------|
//! | **Payloads**      | Compile-time tags for every payload type.              | [`Payload`], [`payload_types!`], [`TagFamily`] |
//! | **Registry**      | Register-phase bookkeeping of sources and sinks.       | [`ChannelRegistry`], [`PluginTypeRegistry`] |
//! | **Network**       | Typed channels and node kinds.                         | [`DataNetwork`], [`FunctionNode`], [`SourceNode`] |
//! | **Sources**       | Start/stop-able producers.                             | [`DataSource`], [`SimpleDataSource`], [`OwnThreadDataSource`] |
//! | **Plugins**       | The unit of functionality.                             | [`Plugin`]                                  |
//! | **Lifecycle**     | Phased start, orderly teardown, events.                | [`PipelineManager`], [`PipelineEvent`]      |
//! | **Errors**        | Accumulating outcome and typed errors.                 | [`Outcome`], [`NetworkError`], [`PipelineError`] |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use pipevisor::{
//!     ChannelRegistry, ControlMessage, DataNetwork, DataSourceList, Outcome, PipelineBuilder,
//!     PipelineConfig, PipelineStatus, Plugin, PluginTypeRegistry, SimpleDataSource, families,
//!     payload_types,
//! };
//!
//! #[derive(Clone)]
//! struct Tick(u32);
//! payload_types!(families::REPLAYER => { Tick = 0 });
//!
//! struct Countdown;
//!
//! impl Plugin for Countdown {
//!     fn id(&self) -> &str { "countdown" }
//!
//!     fn register_types(&mut self, registry: &mut PluginTypeRegistry<'_>) -> Outcome {
//!         registry.register_as_source::<ControlMessage>();
//!         Outcome::success()
//!     }
//!
//!     fn init(&mut self, _: &ChannelRegistry, network: &DataNetwork, sources: &mut DataSourceList) -> Outcome {
//!         let weak = network.downgrade();
//!         let mut left = 3;
//!         match SimpleDataSource::new(network, move || {
//!             left -= 1;
//!             if left == 0 {
//!                 if let Some(network) = weak.upgrade() {
//!                     let _ = network.push(ControlMessage::complete("countdown", "done"));
//!                 }
//!                 return None;
//!             }
//!             Some(Tick(left))
//!         }) {
//!             Ok(source) => {
//!                 sources.push(source);
//!                 Outcome::success()
//!             }
//!             Err(err) => err.into(),
//!         }
//!     }
//! }
//!
//! let manager = PipelineBuilder::new(PipelineConfig::default())
//!     .with_plugin(Countdown)
//!     .build()
//!     .unwrap();
//! assert!(manager.start().is_success());
//! assert_eq!(manager.wait_for_stop(Duration::ZERO), PipelineStatus::Complete);
//! assert_eq!(manager.exit_info().origin, "countdown");
//! ```

mod error;
mod events;
mod network;
mod pipeline;
mod plugin;
mod registry;
mod sources;
mod types;

pub use error::{NetworkError, Outcome, PipelineError};
pub use events::{EventKind, Phase, PipelineEvent};
pub use network::{
    BroadcastNode, Concurrency, DataNetwork, FunctionNode, Graph, GraphNode, OutputPort,
    Receiver, Sender, SourceNode, WeakNetwork,
};
pub use pipeline::{
    ControlKind, ControlMessage, ExitInfo, NotificationCallback, PipelineBuilder,
    PipelineConfig, PipelineManager, PipelineStatus,
};
pub use plugin::{Plugin, PluginId};
pub use registry::{ChannelRegistry, PluginTypeRegistry};
pub use sources::{DataSource, DataSourceList, OwnThreadDataSource, SimpleDataSource};
pub use types::{MAX_TYPE_TAG, MAX_TYPES_PER_FAMILY, Payload, TagFamily, TypeTag, families};

#[doc(hidden)]
pub use types::assert_distinct_offsets as __assert_distinct_offsets;
