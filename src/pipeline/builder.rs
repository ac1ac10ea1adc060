use std::io;
use std::sync::Arc;

use crate::plugin::Plugin;

use super::config::PipelineConfig;
use super::manager::PipelineManager;
use super::notifier::NotificationCallback;

/// Builder for constructing a [`PipelineManager`].
pub struct PipelineBuilder {
    cfg: PipelineConfig,
    plugins: Vec<Box<dyn Plugin>>,
    callback: Option<NotificationCallback>,
}

impl PipelineBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: PipelineConfig) -> Self {
        Self {
            cfg,
            plugins: Vec::new(),
            callback: None,
        }
    }

    /// Replaces the plugin list. Plugins are started in list order.
    pub fn with_plugins(mut self, plugins: Vec<Box<dyn Plugin>>) -> Self {
        self.plugins = plugins;
        self
    }

    /// Appends one plugin.
    pub fn with_plugin(mut self, plugin: impl Plugin) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Sets the callback receiving plugin notifications.
    pub fn with_notification_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Builds the manager.
    ///
    /// This spawns the worker pool, the control thread and the notifier thread; it fails
    /// only if the OS refuses to create them.
    pub fn build(self) -> io::Result<PipelineManager> {
        PipelineManager::new_internal(self.cfg, self.plugins, self.callback)
    }
}
