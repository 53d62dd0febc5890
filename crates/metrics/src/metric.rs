//! The closed set of metric kinds a registry can hold.

use crate::counter::{Counter, InstantCounter};
use crate::gauge::{Gauge, GaugeFloat64};
use crate::healthcheck::Healthcheck;
use crate::histogram::Histogram;
use crate::meter::Meter;
use crate::timer::Timer;
use std::fmt;
use std::sync::Arc;

/// Discriminant of a [`Metric`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// [`Counter`].
    Counter,
    /// [`Gauge`].
    Gauge,
    /// [`GaugeFloat64`].
    GaugeFloat64,
    /// [`InstantCounter`].
    InstantCounter,
    /// [`Histogram`].
    Histogram,
    /// [`Meter`].
    Meter,
    /// [`Timer`].
    Timer,
    /// [`Healthcheck`].
    Healthcheck,
}

impl MetricKind {
    /// Lower-case label used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::GaugeFloat64 => "gauge_float64",
            Self::InstantCounter => "instant_counter",
            Self::Histogram => "histogram",
            Self::Meter => "meter",
            Self::Timer => "timer",
            Self::Healthcheck => "healthcheck",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Shared handle to a registered metric.
///
/// Cloning clones the handle, never the underlying value.
#[derive(Debug, Clone)]
pub enum Metric {
    /// Incrementable integer count.
    Counter(Arc<Counter>),
    /// Last integer value.
    Gauge(Arc<Gauge>),
    /// Last floating-point value.
    GaugeFloat64(Arc<GaugeFloat64>),
    /// Count drained on every export.
    InstantCounter(Arc<InstantCounter>),
    /// Value distribution.
    Histogram(Arc<Histogram>),
    /// Event rates.
    Meter(Arc<Meter>),
    /// Duration distribution and call rates.
    Timer(Arc<Timer>),
    /// Health probe.
    Healthcheck(Arc<Healthcheck>),
}

impl Metric {
    /// Kind of the held metric.
    #[must_use]
    pub const fn kind(&self) -> MetricKind {
        match self {
            Self::Counter(_) => MetricKind::Counter,
            Self::Gauge(_) => MetricKind::Gauge,
            Self::GaugeFloat64(_) => MetricKind::GaugeFloat64,
            Self::InstantCounter(_) => MetricKind::InstantCounter,
            Self::Histogram(_) => MetricKind::Histogram,
            Self::Meter(_) => MetricKind::Meter,
            Self::Timer(_) => MetricKind::Timer,
            Self::Healthcheck(_) => MetricKind::Healthcheck,
        }
    }

    /// Apply an integer update.
    ///
    /// Meters are marked `value` times and timers record `value` nanoseconds.
    /// Float gauges and healthchecks ignore the update.
    pub fn update(&self, value: i64) {
        match self {
            Self::Counter(counter) => counter.update(value),
            Self::Gauge(gauge) => gauge.update(value),
            Self::InstantCounter(counter) => counter.update(value),
            Self::Histogram(histogram) => histogram.update(value),
            Self::Meter(meter) => meter.mark(value),
            Self::Timer(timer) => {
                let nanos = u64::try_from(value).unwrap_or(0);
                timer.update(std::time::Duration::from_nanos(nanos));
            },
            Self::GaugeFloat64(_) | Self::Healthcheck(_) => {
                tracing::debug!(kind = %self.kind(), value, "metrics.update_ignored");
            },
        }
    }

    /// Whether both handles point at the same metric.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Counter(a), Self::Counter(b)) => Arc::ptr_eq(a, b),
            (Self::Gauge(a), Self::Gauge(b)) => Arc::ptr_eq(a, b),
            (Self::GaugeFloat64(a), Self::GaugeFloat64(b)) => Arc::ptr_eq(a, b),
            (Self::InstantCounter(a), Self::InstantCounter(b)) => Arc::ptr_eq(a, b),
            (Self::Histogram(a), Self::Histogram(b)) => Arc::ptr_eq(a, b),
            (Self::Meter(a), Self::Meter(b)) => Arc::ptr_eq(a, b),
            (Self::Timer(a), Self::Timer(b)) => Arc::ptr_eq(a, b),
            (Self::Healthcheck(a), Self::Healthcheck(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Concrete metric types that can be stored in a [`Metric`].
pub trait MetricType: Sized {
    /// Kind tag of this type.
    const KIND: MetricKind;

    /// Borrow the typed handle out of `metric` when kinds match.
    fn from_metric(metric: &Metric) -> Option<Arc<Self>>;

    /// Wrap a typed handle.
    fn into_metric(handle: Arc<Self>) -> Metric;
}

macro_rules! metric_type {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl MetricType for $ty {
                const KIND: MetricKind = MetricKind::$ty;

                fn from_metric(metric: &Metric) -> Option<Arc<Self>> {
                    match metric {
                        Metric::$ty(handle) => Some(Arc::clone(handle)),
                        _ => None,
                    }
                }

                fn into_metric(handle: Arc<Self>) -> Metric {
                    Metric::$ty(handle)
                }
            }

            impl From<Arc<$ty>> for Metric {
                fn from(handle: Arc<$ty>) -> Self {
                    Self::$ty(handle)
                }
            }

            impl From<$ty> for Metric {
                fn from(value: $ty) -> Self {
                    Self::$ty(Arc::new(value))
                }
            }
        )+
    };
}

metric_type!(
    Counter,
    Gauge,
    GaugeFloat64,
    InstantCounter,
    Histogram,
    Meter,
    Timer,
    Healthcheck,
);
