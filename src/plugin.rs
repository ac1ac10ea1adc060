//! # Plugin abstraction.
//!
//! This module defines the [`Plugin`] trait: the unit of functionality hosted by the
//! [`PipelineManager`](crate::PipelineManager). Concrete plugins live outside this crate.
//!
//! ```text
//! register_types ──► init ──► push_configs ──► [running] ──► deinit
//!  (bound handle)    (wire      (topology        (data         (best effort,
//!                     nodes,     frozen)          flows)        reverse order)
//!                     sources)
//! ```
//!
//! Every lifecycle method returns an [`Outcome`]; a failure in any of the first three
//! aborts the start attempt and unwinds whatever was already set up.

use std::sync::Arc;

use crate::error::Outcome;
use crate::network::DataNetwork;
use crate::registry::{ChannelRegistry, PluginTypeRegistry};
use crate::sources::DataSourceList;

/// Shared, cheaply cloneable plugin identifier.
pub type PluginId = Arc<str>;

/// # Unit of pipeline functionality.
///
/// A plugin declares the payload types it produces and consumes, wires its nodes into the
/// [`DataNetwork`] and hands back the data sources that feed the network once running.
///
/// Only [`id`](Plugin::id), [`register_types`](Plugin::register_types) and
/// [`init`](Plugin::init) are required; the other hooks default to no-ops.
///
/// # Example
/// ```no_run
/// use pipevisor::{
///     ChannelRegistry, DataNetwork, DataSourceList, FunctionNode, Concurrency, Outcome,
///     Plugin, PluginTypeRegistry, families, payload_types,
/// };
///
/// #[derive(Clone)]
/// struct Reading(f64);
/// payload_types!(families::CONSOLE_REPORTER => { Reading = 0 });
///
/// struct Printer;
///
/// impl Plugin for Printer {
///     fn id(&self) -> &str { "printer" }
///
///     fn register_types(&mut self, registry: &mut PluginTypeRegistry<'_>) -> Outcome {
///         registry.register_as_sink::<Reading>();
///         Outcome::success()
///     }
///
///     fn init(
///         &mut self,
///         registry: &ChannelRegistry,
///         network: &DataNetwork,
///         _sources: &mut DataSourceList,
///     ) -> Outcome {
///         if registry.sources::<Reading>().is_empty() {
///             return Outcome::failure("no plugin produces readings");
///         }
///         let node = FunctionNode::new(network.graph(), Concurrency::Serial, |r: Reading| {
///             println!("{}", r.0);
///         });
///         network.add_sink_node::<Reading, _>(node).into()
///     }
/// }
/// ```
pub trait Plugin: Send + 'static {
    /// Stable, unique identifier of this plugin.
    fn id(&self) -> &str;

    /// One-line human readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Declares produced and consumed payload types.
    ///
    /// Must only register; the network does not exist yet from the plugin's point of view.
    fn register_types(&mut self, registry: &mut PluginTypeRegistry<'_>) -> Outcome;

    /// Wires nodes into `network` and appends data sources to `sources`.
    ///
    /// `registry` holds every registration from the register phase and should be consulted
    /// to fail fast on missing dependencies.
    fn init(
        &mut self,
        registry: &ChannelRegistry,
        network: &DataNetwork,
        sources: &mut DataSourceList,
    ) -> Outcome;

    /// Pushes settled configuration values once the topology is frozen.
    fn push_configs(&mut self, _network: &DataNetwork) -> Outcome {
        Outcome::success()
    }

    /// Best-effort cleanup after the network was drained (or cancelled).
    ///
    /// Must not wait for more data to arrive.
    fn deinit(&mut self, _network: &DataNetwork, _canceled: bool) -> Outcome {
        Outcome::success()
    }
}
