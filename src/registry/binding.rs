//! # Registration handle bound to one plugin.
//!
//! [`PluginTypeRegistry`] is what a plugin receives in
//! [`Plugin::register_types`](crate::Plugin::register_types). It carries the plugin's own
//! id, so a plugin can only ever register itself.

use crate::plugin::PluginId;
use crate::types::Payload;

use super::channel::ChannelRegistry;

/// Visitor used by one plugin to declare the payload types it produces and consumes.
///
/// # Example
/// ```no_run
/// # use pipevisor::{Plugin, PluginTypeRegistry, ChannelRegistry, DataNetwork, DataSourceList, Outcome};
/// # #[derive(Clone)] struct Sample;
/// # pipevisor::payload_types!(pipevisor::families::TEST => { Sample = 0 });
/// struct Collector;
///
/// impl Plugin for Collector {
///     fn id(&self) -> &str { "collector" }
///
///     fn register_types(&mut self, registry: &mut PluginTypeRegistry<'_>) -> Outcome {
///         registry.register_as_source::<Sample>();
///         Outcome::success()
///     }
///
///     fn init(
///         &mut self,
///         _registry: &ChannelRegistry,
///         _network: &DataNetwork,
///         _sources: &mut DataSourceList,
///     ) -> Outcome {
///         Outcome::success()
///     }
/// }
/// ```
pub struct PluginTypeRegistry<'a> {
    registry: &'a mut ChannelRegistry,
    plugin: PluginId,
}

impl<'a> PluginTypeRegistry<'a> {
    pub(crate) fn new(registry: &'a mut ChannelRegistry, plugin: PluginId) -> Self {
        Self { registry, plugin }
    }

    /// Id of the plugin this handle registers for.
    pub fn plugin_id(&self) -> &str {
        &self.plugin
    }

    /// Declares the bound plugin as a source of `T`.
    pub fn register_as_source<T: Payload>(&mut self) -> &mut Self {
        self.registry.add_source::<T>(self.plugin.clone());
        self
    }

    /// Declares the bound plugin as a sink of `T`.
    pub fn register_as_sink<T: Payload>(&mut self) -> &mut Self {
        self.registry.add_sink::<T>(self.plugin.clone());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::testing::{Label, Sample};

    #[test]
    fn test_registers_under_bound_id() {
        let mut reg = ChannelRegistry::new();
        {
            let mut handle = reg.bind(PluginId::from("monitor"));
            assert_eq!(handle.plugin_id(), "monitor");
            handle
                .register_as_source::<Sample>()
                .register_as_sink::<Label>();
        }
        {
            let mut handle = reg.bind(PluginId::from("reporter"));
            handle.register_as_sink::<Sample>();
        }

        assert_eq!(reg.sources::<Sample>(), &[PluginId::from("monitor")]);
        assert_eq!(reg.sinks::<Sample>(), &[PluginId::from("reporter")]);
        assert_eq!(reg.sinks::<Label>(), &[PluginId::from("monitor")]);
    }
}
