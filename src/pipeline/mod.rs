//! Pipeline lifecycle: the manager and what it is made of.
//!
//! The public API from this module is [`PipelineManager`] (built through
//! [`PipelineBuilder`]) plus the value types it exchanges with hosts and plugins.
//!
//! Internal modules:
//! - [`manager`]: phased start, teardown, host surface;
//! - [`control`]: control sink routing and the control thread;
//! - [`notifier`]: bounded delivery of plugin notifications;
//! - [`pool`]: worker pool shared by all networks;
//! - [`status`]: status cell and exit info.

mod builder;
mod config;
mod control;
mod manager;
mod message;
mod notifier;
mod pool;
mod status;

pub use builder::PipelineBuilder;
pub use config::PipelineConfig;
pub use manager::PipelineManager;
pub use message::{ControlKind, ControlMessage};
pub use notifier::NotificationCallback;
pub use status::{ExitInfo, PipelineStatus};
