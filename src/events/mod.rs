//! Lifecycle events and the bus that carries them.

mod bus;
mod event;

pub(crate) use bus::Bus;
pub use event::{EventKind, Phase, PipelineEvent};
