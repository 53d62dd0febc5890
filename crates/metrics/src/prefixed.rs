//! Registry views that scope every name under a prefix.

use crate::metric::Metric;
use crate::registry::{Construct, Registry, RegistryError, StandardRegistry, TryConstruct, Visit};
use std::sync::Arc;

/// View that prepends a fixed prefix to every name before delegating to its
/// parent. Views nest; the outermost prefix ends up first in the full name.
///
/// Enumeration yields full names, still carrying every prefix between this
/// view and the root. Clearing, healthchecks and rendering act on the parent.
#[derive(Clone)]
pub struct PrefixedRegistry {
    parent: Arc<dyn Registry>,
    prefix: Box<str>,
}

impl PrefixedRegistry {
    /// Prefixed view over a fresh [`StandardRegistry`].
    pub fn new(prefix: impl Into<Box<str>>) -> Self {
        Self::child(Arc::new(StandardRegistry::new()), prefix)
    }

    /// Prefixed view over `parent`.
    pub fn child(parent: Arc<dyn Registry>, prefix: impl Into<Box<str>>) -> Self {
        Self {
            parent,
            prefix: prefix.into(),
        }
    }

    /// This view's own prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Registry this view delegates to.
    #[must_use]
    pub fn parent(&self) -> &Arc<dyn Registry> {
        &self.parent
    }

    fn scoped(&self, name: &str) -> String {
        let mut scoped = String::with_capacity(self.prefix.len() + name.len());
        scoped.push_str(&self.prefix);
        scoped.push_str(name);
        scoped
    }
}

impl std::fmt::Debug for PrefixedRegistry {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PrefixedRegistry")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl Registry for PrefixedRegistry {
    fn each_with_prefix(&self, prefix: &str, visit: &mut Visit<'_>) {
        self.parent.each_with_prefix(&self.scoped(prefix), visit);
    }

    fn get(&self, name: &str) -> Option<Metric> {
        self.parent.get(&self.scoped(name))
    }

    fn register(&self, name: &str, metric: Metric) -> Result<(), RegistryError> {
        self.parent.register(&self.scoped(name), metric)
    }

    fn get_or_register_boxed(&self, name: &str, construct: Construct<'_>) -> Metric {
        self.parent.get_or_register_boxed(&self.scoped(name), construct)
    }

    fn try_get_or_register_with(
        &self,
        name: &str,
        construct: TryConstruct<'_>,
    ) -> Result<Metric, RegistryError> {
        self.parent.try_get_or_register_with(&self.scoped(name), construct)
    }

    fn unregister(&self, name: &str) {
        self.parent.unregister(&self.scoped(name));
    }

    fn unregister_all(&self) {
        self.parent.unregister_all();
    }

    fn run_healthchecks(&self) {
        self.parent.run_healthchecks();
    }

    fn update(&self, name: &str, value: i64) {
        self.parent.update(&self.scoped(name), value);
    }

    fn get_current(&self) -> String {
        self.parent.get_current()
    }
}
