//! # Channel registry: who produces and who consumes each payload type.
//!
//! Filled during the register phase, read during the init phase, then discarded.
//!
//! ```text
//! register phase                          init phase
//! ──────────────                          ──────────
//! plugin A ─► bind("a") ─► source<Sample>  plugin B: registry.sources::<Sample>()
//! plugin B ─► bind("b") ─► sink<Sample>             └─► ["a"]  (dependency present)
//!
//!                 HashMap<TypeTag, Registration>
//!                   tag(Sample) → { sources: ["a"], sinks: ["b"] }
//! ```
//!
//! ## Rules
//! - Entries are created lazily on the first registration of a type.
//! - Duplicates are kept: registering twice appends twice.
//! - Querying an unknown type yields an empty slice, never an error.
//! - Only the lifecycle manager can hand out registration handles
//!   ([`PluginTypeRegistry`](crate::PluginTypeRegistry)), each bound to one plugin id.

use std::any::TypeId;
use std::collections::HashMap;

use crate::plugin::PluginId;
use crate::types::{Payload, TypeTag};

use super::binding::PluginTypeRegistry;

/// Sources and sinks registered for one payload type.
#[derive(Debug)]
struct Registration {
    type_id: TypeId,
    type_name: &'static str,
    sources: Vec<PluginId>,
    sinks: Vec<PluginId>,
}

/// Registry of declared sources and sinks, keyed by payload tag.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    entries: HashMap<TypeTag, Registration>,
}

impl ChannelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a registration handle bound to `plugin`.
    pub(crate) fn bind(&mut self, plugin: PluginId) -> PluginTypeRegistry<'_> {
        PluginTypeRegistry::new(self, plugin)
    }

    /// Appends `plugin` to the sources of `T`.
    pub(crate) fn add_source<T: Payload>(&mut self, plugin: PluginId) {
        self.entry::<T>().sources.push(plugin);
    }

    /// Appends `plugin` to the sinks of `T`.
    pub(crate) fn add_sink<T: Payload>(&mut self, plugin: PluginId) {
        self.entry::<T>().sinks.push(plugin);
    }

    /// True if at least one source or sink was registered for `T`.
    pub fn has_channel<T: Payload>(&self) -> bool {
        self.has_channel_tag(T::TAG)
    }

    /// Tag-addressed variant of [`ChannelRegistry::has_channel`].
    pub fn has_channel_tag(&self, tag: TypeTag) -> bool {
        self.entries.contains_key(&tag)
    }

    /// Plugins registered as sources of `T`, in registration order.
    pub fn sources<T: Payload>(&self) -> &[PluginId] {
        self.sources_of(T::TAG)
    }

    /// Plugins registered as sinks of `T`, in registration order.
    pub fn sinks<T: Payload>(&self) -> &[PluginId] {
        self.sinks_of(T::TAG)
    }

    pub fn sources_of(&self, tag: TypeTag) -> &[PluginId] {
        self.entries
            .get(&tag)
            .map(|r| r.sources.as_slice())
            .unwrap_or(&[])
    }

    pub fn sinks_of(&self, tag: TypeTag) -> &[PluginId] {
        self.entries
            .get(&tag)
            .map(|r| r.sinks.as_slice())
            .unwrap_or(&[])
    }

    /// Number of payload types with at least one registration.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry for `T`, creating it on first use.
    ///
    /// # Panics
    /// If the tag of `T` is already bound to a different Rust type.
    fn entry<T: Payload>(&mut self) -> &mut Registration {
        let reg = self.entries.entry(T::TAG).or_insert_with(|| Registration {
            type_id: TypeId::of::<T>(),
            type_name: T::type_name(),
            sources: Vec::new(),
            sinks: Vec::new(),
        });
        if reg.type_id != TypeId::of::<T>() {
            panic!(
                "payload tag {} is bound to both {} and {}",
                T::TAG,
                reg.type_name,
                T::type_name()
            );
        }
        reg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::testing::{Label, Sample};

    fn id(s: &str) -> PluginId {
        PluginId::from(s)
    }

    #[test]
    fn test_unknown_type_is_empty() {
        let reg = ChannelRegistry::new();
        assert!(!reg.has_channel::<Sample>());
        assert!(reg.sources::<Sample>().is_empty());
        assert!(reg.sinks::<Sample>().is_empty());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_registration_creates_entry() {
        let mut reg = ChannelRegistry::new();
        reg.add_source::<Sample>(id("collector"));
        reg.add_sink::<Label>(id("reporter"));

        assert!(reg.has_channel::<Sample>());
        assert!(reg.has_channel_tag(<Label as Payload>::TAG));
        assert_eq!(reg.sources::<Sample>(), &[id("collector")]);
        assert!(reg.sinks::<Sample>().is_empty());
        assert_eq!(reg.sinks::<Label>(), &[id("reporter")]);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_duplicates_are_preserved() {
        let mut reg = ChannelRegistry::new();
        reg.add_sink::<Sample>(id("a"));
        reg.add_sink::<Sample>(id("a"));
        reg.add_sink::<Sample>(id("b"));
        assert_eq!(reg.sinks::<Sample>().len(), 3);
    }

    #[derive(Clone)]
    struct Impostor;
    impl Payload for Impostor {
        const TAG: TypeTag = <Sample as Payload>::TAG;
    }

    #[test]
    #[should_panic(expected = "is bound to both")]
    fn test_tag_collision_panics() {
        let mut reg = ChannelRegistry::new();
        reg.add_source::<Sample>(id("a"));
        reg.add_source::<Impostor>(id("b"));
    }

    mod property {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn list_length_equals_number_of_calls(ops in proptest::collection::vec((0u8..4, 0u8..3), 0..64)) {
                let mut reg = ChannelRegistry::new();
                let mut expected = [[0usize; 2]; 2];
                for (op, who) in &ops {
                    let plugin = id(&format!("p{who}"));
                    match op {
                        0 => { reg.add_source::<Sample>(plugin); expected[0][0] += 1; }
                        1 => { reg.add_sink::<Sample>(plugin); expected[0][1] += 1; }
                        2 => { reg.add_source::<Label>(plugin); expected[1][0] += 1; }
                        _ => { reg.add_sink::<Label>(plugin); expected[1][1] += 1; }
                    }
                }
                prop_assert_eq!(reg.sources::<Sample>().len(), expected[0][0]);
                prop_assert_eq!(reg.sinks::<Sample>().len(), expected[0][1]);
                prop_assert_eq!(reg.sources::<Label>().len(), expected[1][0]);
                prop_assert_eq!(reg.sinks::<Label>().len(), expected[1][1]);
            }
        }
    }
}
