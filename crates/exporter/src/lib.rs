//! # optron-exporter
//!
//! Pushes registry snapshots to a collector. Every tick the [`Optron`]
//! exporter walks a [`Registry`](optron_metrics::Registry), turns each metric
//! into a flat [`ExportRecord`], groups the records per the collector's
//! [`BatchPolicy`], and writes each payload as one CRLF-terminated JSON line.
//!
//! Delivery is best effort. A payload that fails to write is dropped and the
//! connection is re-dialled; nothing is queued for the next tick.
//!
//! [`LogReporter`] renders the same registry into log lines on its own tick.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::future::Future;
use std::pin::Pin;

pub mod batch;
pub mod error;
pub mod exporter;
pub mod fields;
pub mod record;
pub mod reporter;
pub mod transport;

pub use batch::{BatchBuilder, BatchPolicy, Payload};
pub use error::ExportError;
pub use exporter::{CycleReport, Optron};
pub use fields::append_metric_fields;
pub use record::ExportRecord;
pub use reporter::LogReporter;
pub use transport::{Dialer, TcpDialer, Transport};

/// Boxed future used by the transport traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Returns the exporter crate version.
#[must_use]
pub const fn exporter_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
