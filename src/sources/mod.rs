//! Data sources: what feeds the network while the pipeline runs.
//!
//! - [`DataSource`] is the start/stop contract;
//! - [`SimpleDataSource`] runs its body on the graph scheduler;
//! - [`OwnThreadDataSource`] runs its body on a dedicated thread.

mod completion;
mod own_thread;
mod simple;
mod source;

pub use own_thread::OwnThreadDataSource;
pub use simple::SimpleDataSource;
pub use source::{DataSource, DataSourceList};

pub(crate) use completion::Completion;
