//! # Data source contract and the list plugins append to.
//!
//! A [`DataSource`] feeds the network while the pipeline is running. Plugins create them in
//! [`Plugin::init`](crate::Plugin::init) and append them to the [`DataSourceList`]; the
//! lifecycle manager starts them once the topology is frozen and stops them first on
//! teardown.
//!
//! The list remembers which plugin appended each source so that start failures can name it.

use crate::error::Outcome;
use crate::plugin::PluginId;

/// Something that pushes data into the network while the pipeline runs.
pub trait DataSource: Send + 'static {
    /// Begins producing. Called once per pipeline run.
    fn start(&mut self) -> Outcome;

    /// Stops producing and blocks until no more data will be pushed.
    fn stop(&mut self) -> Outcome;
}

/// Data sources collected during the init phase, in append order.
#[derive(Default)]
pub struct DataSourceList {
    owner: Option<PluginId>,
    entries: Vec<(Option<PluginId>, Box<dyn DataSource>)>,
}

impl DataSourceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `source`.
    pub fn push(&mut self, source: impl DataSource) {
        self.push_boxed(Box::new(source));
    }

    pub fn push_boxed(&mut self, source: Box<dyn DataSource>) {
        self.entries.push((self.owner.clone(), source));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plugin recorded for sources appended from now on.
    pub(crate) fn set_owner(&mut self, owner: Option<PluginId>) {
        self.owner = owner;
    }

    /// Plugin that appended the source at `index`, if known.
    pub(crate) fn owner_of(&self, index: usize) -> Option<&str> {
        self.entries.get(index).and_then(|(owner, _)| owner.as_deref())
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Box<dyn DataSource>> {
        self.entries.get_mut(index).map(|(_, source)| source)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.owner = None;
    }
}

impl std::fmt::Debug for DataSourceList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(owner, _)| owner.as_deref().unwrap_or("?")))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl DataSource for Noop {
        fn start(&mut self) -> Outcome {
            Outcome::success()
        }
        fn stop(&mut self) -> Outcome {
            Outcome::success()
        }
    }

    #[test]
    fn test_sources_remember_their_owner() {
        let mut list = DataSourceList::new();
        list.push(Noop);
        list.set_owner(Some(PluginId::from("monitor")));
        list.push(Noop);
        list.push_boxed(Box::new(Noop));

        assert_eq!(list.len(), 3);
        assert_eq!(list.owner_of(0), None);
        assert_eq!(list.owner_of(1), Some("monitor"));
        assert_eq!(list.owner_of(2), Some("monitor"));
        assert!(list.get_mut(2).is_some());

        list.clear();
        assert!(list.is_empty());
    }
}
