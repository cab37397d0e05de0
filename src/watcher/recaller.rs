use std::sync::Arc;

use super::Watcher;
use crate::registry::{Dependency, DependencyData};

/// A template's view of the [`Watcher`] during one rendering pass.
///
/// Every recall starts tracking the dependency and remembers the version that
/// was read, which [`Watcher::register`] later records as consumed.
#[derive(Debug, Clone)]
pub struct Recaller {
    watcher: Watcher,
    template_id: String,
}

impl Recaller {
    pub(super) fn new(watcher: Watcher, template_id: String) -> Self {
        Self {
            watcher,
            template_id,
        }
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    /// Track `dependency` and return its value, `None` while loading.
    pub fn recall(&self, dependency: &Dependency) -> Option<Arc<DependencyData>> {
        let key = dependency.key();

        // Mark the key as referenced before it can be retired by another pass.
        self.watcher.observe(&self.template_id, &key, 0);
        self.watcher.add(dependency.clone());

        let (value, version) = self.watcher.snapshot(&key)?;
        self.watcher.observe(&self.template_id, &key, version);
        value
    }
}
