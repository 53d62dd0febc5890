//! # optron-metrics
//!
//! In-process metrics: the metric kinds, a thread-safe [`Registry`] with
//! prefixed views, and the tag codec that embeds dimensions in metric names.
//!
//! ```
//! use optron_metrics::{Registry, RegistryExt, StandardRegistry};
//!
//! let registry = StandardRegistry::new();
//! registry.update("requests", 5);
//! let requests = registry.counter("requests")?;
//! assert_eq!(requests.count(), 5);
//! # Ok::<(), optron_metrics::RegistryError>(())
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod counter;
pub mod gauge;
pub mod healthcheck;
pub mod histogram;
pub mod meter;
pub mod metric;
pub mod prefixed;
pub mod registry;
pub mod render;
pub mod tag;
pub mod timer;

pub use counter::{Counter, InstantCounter};
pub use gauge::{Gauge, GaugeFloat64};
pub use healthcheck::Healthcheck;
pub use histogram::{Histogram, HistogramSnapshot};
pub use meter::{Meter, MeterSnapshot};
pub use metric::{Metric, MetricKind, MetricType};
pub use prefixed::PrefixedRegistry;
pub use registry::{
    Construct, Registry, RegistryError, RegistryExt, StandardRegistry, TryConstruct, Visit,
    default_registry,
};
pub use render::{render_current, summarize};
pub use tag::{
    TAG_DELIMITER, TAG_METRIC_DELIMITER, TagBoard, TagError, is_tagged, parse_tagged_metric,
    tagged_metric_name, try_tagged_metric_name,
};
pub use timer::{Timer, TimerSnapshot};
