//! Registration-phase bookkeeping.
//!
//! - [`ChannelRegistry`] records which plugin declared itself a source or sink of each type;
//! - [`PluginTypeRegistry`] is the per-plugin handle used during the register phase.

mod binding;
mod channel;

pub use binding::PluginTypeRegistry;
pub use channel::ChannelRegistry;
