//! Thread-safe name to metric mapping.

use crate::counter::{Counter, InstantCounter};
use crate::gauge::{Gauge, GaugeFloat64};
use crate::histogram::Histogram;
use crate::meter::Meter;
use crate::metric::{Metric, MetricKind, MetricType};
use crate::render::render_current;
use crate::timer::Timer;
use optron_shared::{ErrorCode, ErrorEnvelope};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::ops::Bound;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Registry operation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The name is already registered.
    #[error("duplicate metric: {0}")]
    DuplicateMetric(String),
    /// The name holds a metric of another kind.
    #[error("metric {name} is a {found}, not a {expected}")]
    KindMismatch {
        /// Requested name.
        name: String,
        /// Kind the caller asked for.
        expected: MetricKind,
        /// Kind already registered.
        found: MetricKind,
    },
    /// The metric constructor failed.
    #[error("failed to construct metric {name}: {reason}")]
    Construction {
        /// Requested name.
        name: String,
        /// Constructor failure.
        reason: String,
    },
}

impl RegistryError {
    /// Stable error code.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::DuplicateMetric(_) => ErrorCode::new("metrics", "duplicate_metric"),
            Self::KindMismatch { .. } => ErrorCode::new("metrics", "kind_mismatch"),
            Self::Construction { .. } => ErrorCode::new("metrics", "construction_failed"),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::DuplicateMetric(name)
            | Self::KindMismatch { name, .. }
            | Self::Construction { name, .. } => name,
        }
    }
}

impl From<RegistryError> for ErrorEnvelope {
    fn from(error: RegistryError) -> Self {
        let code = error.error_code();
        let name = error.name().to_owned();
        let envelope = match &error {
            RegistryError::Construction { .. } => Self::invariant(code, error.to_string()),
            _ => Self::expected(code, error.to_string()),
        };
        envelope.with_metadata("metric", name)
    }
}

/// Visitor passed to [`Registry::each`].
pub type Visit<'a> = dyn FnMut(&str, &Metric) + 'a;

/// Deferred metric constructor.
pub type Construct<'a> = Box<dyn FnOnce() -> Metric + 'a>;

/// Deferred metric constructor that may fail.
pub type TryConstruct<'a> = Box<dyn FnOnce() -> Result<Metric, RegistryError> + 'a>;

/// Named metric storage.
///
/// Visitors run outside any lock the implementation holds, so they may call
/// back into the registry.
pub trait Registry: Send + Sync {
    /// Visit every metric whose full name starts with `prefix`, in ascending
    /// name order, over a snapshot taken at call time.
    fn each_with_prefix(&self, prefix: &str, visit: &mut Visit<'_>);

    /// Visit every metric in ascending name order.
    fn each(&self, visit: &mut Visit<'_>) {
        self.each_with_prefix("", visit);
    }

    /// Look up a metric without creating it.
    fn get(&self, name: &str) -> Option<Metric>;

    /// Register `metric` under `name`, failing if the name is taken.
    fn register(&self, name: &str, metric: Metric) -> Result<(), RegistryError>;

    /// Return the metric at `name`, registering the constructor's result when
    /// absent. Concurrent callers racing on one name construct exactly once.
    fn get_or_register_boxed(&self, name: &str, construct: Construct<'_>) -> Metric;

    /// Like [`Registry::get_or_register_boxed`] for constructors that can fail.
    /// Nothing is registered when the constructor fails.
    fn try_get_or_register_with(
        &self,
        name: &str,
        construct: TryConstruct<'_>,
    ) -> Result<Metric, RegistryError>;

    /// Remove `name` if present.
    fn unregister(&self, name: &str);

    /// Remove every metric.
    fn unregister_all(&self);

    /// Re-evaluate every healthcheck.
    fn run_healthchecks(&self);

    /// Apply an integer update to `name`, creating a [`Counter`] there if absent.
    fn update(&self, name: &str, value: i64);

    /// Deterministic rendering of every metric, ordered like [`Registry::each`].
    fn get_current(&self) -> String {
        render_current(self)
    }
}

/// Typed conveniences over any [`Registry`].
pub trait RegistryExt: Registry {
    /// Return the metric at `name`, registering `metric` first when absent.
    fn get_or_register(&self, name: &str, metric: impl Into<Metric>) -> Metric {
        let metric = metric.into();
        self.get_or_register_boxed(name, Box::new(move || metric))
    }

    /// Return the metric at `name`, calling `construct` only when absent.
    fn get_or_register_with<F>(&self, name: &str, construct: F) -> Metric
    where
        F: FnOnce() -> Metric,
    {
        self.get_or_register_boxed(name, Box::new(construct))
    }

    /// Get or create a metric of type `T`.
    fn get_or_register_typed<T, F>(&self, name: &str, construct: F) -> Result<Arc<T>, RegistryError>
    where
        T: MetricType,
        F: FnOnce() -> Result<T, RegistryError>,
    {
        let metric = self.try_get_or_register_with(
            name,
            Box::new(move || construct().map(|value| T::into_metric(Arc::new(value)))),
        )?;
        T::from_metric(&metric).ok_or_else(|| RegistryError::KindMismatch {
            name: name.to_owned(),
            expected: T::KIND,
            found: metric.kind(),
        })
    }

    /// Get or create a [`Counter`].
    fn counter(&self, name: &str) -> Result<Arc<Counter>, RegistryError> {
        self.get_or_register_typed(name, || Ok(Counter::new()))
    }

    /// Get or create a [`Gauge`].
    fn gauge(&self, name: &str) -> Result<Arc<Gauge>, RegistryError> {
        self.get_or_register_typed(name, || Ok(Gauge::new()))
    }

    /// Get or create a [`GaugeFloat64`].
    fn gauge_float64(&self, name: &str) -> Result<Arc<GaugeFloat64>, RegistryError> {
        self.get_or_register_typed(name, || Ok(GaugeFloat64::new()))
    }

    /// Get or create an [`InstantCounter`].
    fn instant_counter(&self, name: &str) -> Result<Arc<InstantCounter>, RegistryError> {
        self.get_or_register_typed(name, || Ok(InstantCounter::new()))
    }

    /// Get or create a [`Histogram`].
    fn histogram(&self, name: &str) -> Result<Arc<Histogram>, RegistryError> {
        self.get_or_register_typed(name, || {
            Histogram::new().map_err(|error| construction_error(name, &error))
        })
    }

    /// Get or create a [`Meter`].
    fn meter(&self, name: &str) -> Result<Arc<Meter>, RegistryError> {
        self.get_or_register_typed(name, || Ok(Meter::new()))
    }

    /// Get or create a [`Timer`].
    fn timer(&self, name: &str) -> Result<Arc<Timer>, RegistryError> {
        self.get_or_register_typed(name, || {
            Timer::new().map_err(|error| construction_error(name, &error))
        })
    }
}

impl<R: Registry + ?Sized> RegistryExt for R {}

fn construction_error(name: &str, error: &impl std::fmt::Display) -> RegistryError {
    RegistryError::Construction {
        name: name.to_owned(),
        reason: error.to_string(),
    }
}

/// Registry backed by a read/write-locked ordered map.
#[derive(Debug, Default)]
pub struct StandardRegistry {
    metrics: RwLock<BTreeMap<Box<str>, Metric>>,
}

impl StandardRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no metric is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<Box<str>, Metric>> {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<Box<str>, Metric>> {
        self.metrics.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self, prefix: &str) -> Vec<(Box<str>, Metric)> {
        self.read()
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, metric)| (name.clone(), metric.clone()))
            .collect()
    }

    fn get_or_insert_with<E>(
        &self,
        name: &str,
        construct: impl FnOnce() -> Result<Metric, E>,
    ) -> Result<Metric, E> {
        if let Some(existing) = self.get(name) {
            return Ok(existing);
        }
        let mut metrics = self.write();
        if let Some(existing) = metrics.get(name) {
            return Ok(existing.clone());
        }
        let metric = construct()?;
        metrics.insert(name.into(), metric.clone());
        Ok(metric)
    }
}

impl Registry for StandardRegistry {
    fn each_with_prefix(&self, prefix: &str, visit: &mut Visit<'_>) {
        for (name, metric) in self.snapshot(prefix) {
            visit(&name, &metric);
        }
    }

    fn get(&self, name: &str) -> Option<Metric> {
        self.read().get(name).cloned()
    }

    fn register(&self, name: &str, metric: Metric) -> Result<(), RegistryError> {
        let mut metrics = self.write();
        if metrics.contains_key(name) {
            return Err(RegistryError::DuplicateMetric(name.to_owned()));
        }
        metrics.insert(name.into(), metric);
        Ok(())
    }

    fn get_or_register_boxed(&self, name: &str, construct: Construct<'_>) -> Metric {
        match self.get_or_insert_with(name, || Ok::<_, Infallible>(construct())) {
            Ok(metric) => metric,
            Err(never) => match never {},
        }
    }

    fn try_get_or_register_with(
        &self,
        name: &str,
        construct: TryConstruct<'_>,
    ) -> Result<Metric, RegistryError> {
        self.get_or_insert_with(name, construct)
    }

    fn unregister(&self, name: &str) {
        self.write().remove(name);
    }

    fn unregister_all(&self) {
        self.write().clear();
    }

    fn run_healthchecks(&self) {
        let checks: Vec<_> = self
            .read()
            .values()
            .filter_map(|metric| match metric {
                Metric::Healthcheck(healthcheck) => Some(Arc::clone(healthcheck)),
                _ => None,
            })
            .collect();
        for healthcheck in checks {
            healthcheck.check();
        }
    }

    fn update(&self, name: &str, value: i64) {
        self.get_or_register_with(name, || Metric::from(Counter::new()))
            .update(value);
    }
}

static DEFAULT_REGISTRY: OnceLock<Arc<StandardRegistry>> = OnceLock::new();

/// Process-wide registry, created on first use.
pub fn default_registry() -> Arc<StandardRegistry> {
    Arc::clone(DEFAULT_REGISTRY.get_or_init(|| Arc::new(StandardRegistry::new())))
}

/// [`Registry::each`] on the default registry.
pub fn each(visit: &mut Visit<'_>) {
    default_registry().each(visit);
}

/// [`Registry::get`] on the default registry.
pub fn get(name: &str) -> Option<Metric> {
    default_registry().get(name)
}

/// [`Registry::register`] on the default registry.
pub fn register(name: &str, metric: Metric) -> Result<(), RegistryError> {
    default_registry().register(name, metric)
}

/// [`RegistryExt::get_or_register`] on the default registry.
pub fn get_or_register(name: &str, metric: Metric) -> Metric {
    default_registry().get_or_register(name, metric)
}

/// [`Registry::unregister`] on the default registry.
pub fn unregister(name: &str) {
    default_registry().unregister(name);
}

/// [`Registry::run_healthchecks`] on the default registry.
pub fn run_healthchecks() {
    default_registry().run_healthchecks();
}

/// [`Registry::update`] on the default registry.
pub fn update(name: &str, value: i64) {
    default_registry().update(name, value);
}

/// [`Registry::get_current`] on the default registry.
pub fn get_current() -> String {
    default_registry().get_current()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Healthcheck;

    #[test]
    fn update_creates_counter_and_accumulates() {
        let registry = StandardRegistry::new();
        let counter = registry.counter("requests").expect("counter");
        for _ in 0..3 {
            registry.update("requests", 5);
        }
        assert_eq!(counter.count(), 15);

        registry.update("lazy", 2);
        let lazy = registry.get("lazy").expect("lazy counter");
        assert_eq!(lazy.kind(), MetricKind::Counter);
    }

    #[test]
    fn register_rejects_duplicates_without_replacing() {
        let registry = StandardRegistry::new();
        let original = Metric::from(Gauge::new());
        registry.register("load", original.clone()).expect("first");

        let error = registry
            .register("load", Metric::from(Gauge::new()))
            .expect_err("duplicate");
        assert_eq!(error, RegistryError::DuplicateMetric("load".to_owned()));
        assert!(registry.get("load").expect("kept").ptr_eq(&original));

        let envelope = ErrorEnvelope::from(error);
        assert_eq!(envelope.code, ErrorCode::new("metrics", "duplicate_metric"));
        assert_eq!(envelope.metadata.get("metric").map(String::as_str), Some("load"));
    }

    #[test]
    fn get_or_register_keeps_first_instance() {
        let registry = StandardRegistry::new();
        let first = registry.get_or_register("hits", Metric::from(Counter::new()));
        let second = registry.get_or_register("hits", Metric::from(Counter::new()));
        assert!(first.ptr_eq(&second));

        let mut calls = 0;
        let third = registry.get_or_register_with("hits", || {
            calls += 1;
            Metric::from(Counter::new())
        });
        assert_eq!(calls, 0);
        assert!(first.ptr_eq(&third));
    }

    #[test]
    fn typed_accessor_reports_kind_mismatch() {
        let registry = StandardRegistry::new();
        registry.gauge("temp").expect("gauge");
        let error = registry.counter("temp").expect_err("mismatch");
        assert_eq!(
            error,
            RegistryError::KindMismatch {
                name: "temp".to_owned(),
                expected: MetricKind::Counter,
                found: MetricKind::Gauge,
            }
        );
    }

    #[test]
    fn failing_constructor_registers_nothing() {
        let registry = StandardRegistry::new();
        let result = registry.try_get_or_register_with(
            "broken",
            Box::new(|| {
                Err(RegistryError::Construction {
                    name: "broken".to_owned(),
                    reason: "no memory".to_owned(),
                })
            }),
        );
        assert!(result.is_err());
        assert!(registry.get("broken").is_none());
        assert!(registry.histogram("latency").is_ok());
        assert!(registry.timer("call").is_ok());
    }

    #[test]
    fn each_visits_sorted_and_filters_prefix() {
        let registry = StandardRegistry::new();
        for name in ["b", "a.2", "a.1", "c", "a"] {
            registry.update(name, 1);
        }
        let mut seen = Vec::new();
        registry.each(&mut |name, _| seen.push(name.to_owned()));
        assert_eq!(seen, ["a", "a.1", "a.2", "b", "c"]);

        let mut scoped = Vec::new();
        registry.each_with_prefix("a.", &mut |name, _| scoped.push(name.to_owned()));
        assert_eq!(scoped, ["a.1", "a.2"]);
    }

    #[test]
    fn visitor_may_reenter_registry() {
        let registry = StandardRegistry::new();
        registry.update("x", 1);
        registry.update("y", 1);
        registry.each(&mut |name, _| {
            registry.unregister(if name == "x" { "y" } else { "x" });
            registry.update("z", 1);
        });
        assert!(registry.get("z").is_some());
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = StandardRegistry::new();
        registry.update("gone", 1);
        registry.unregister("gone");
        registry.unregister("gone");
        assert!(registry.is_empty());

        registry.update("a", 1);
        registry.update("b", 1);
        registry.unregister_all();
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn run_healthchecks_records_failures_on_instances() {
        let registry = StandardRegistry::new();
        let healthcheck = Arc::new(Healthcheck::new(|| Err("disk full".to_owned())));
        registry
            .register("disk", Metric::from(Arc::clone(&healthcheck)))
            .expect("register");
        assert_eq!(healthcheck.error(), None);
        registry.run_healthchecks();
        assert_eq!(healthcheck.error().as_deref(), Some("disk full"));
    }

    #[test]
    fn default_registry_is_shared() {
        update("default.registry.test", 3);
        let metric = get("default.registry.test").expect("registered");
        assert!(default_registry().get("default.registry.test").expect("same").ptr_eq(&metric));
        assert!(get_current().contains("Metrics: default.registry.test: 3"));
        unregister("default.registry.test");
        assert!(get("default.registry.test").is_none());
    }
}
