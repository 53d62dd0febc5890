//! Metric to export-field translation.

use crate::record::ExportRecord;
use optron_metrics::{Metric, parse_tagged_metric};
use serde_json::Value;
use std::time::Duration;

const TIMER_QUANTILES: [(f64, &str); 4] =
    [(0.80, "_80"), (0.90, "_90"), (0.95, "_95"), (0.99, "_99")];

/// Add the fields for one registry entry to `record`.
///
/// Tagged names are split first: the decoded tags land as top-level fields and
/// the base name keys the value fields. Reading an instant counter drains it.
/// Healthchecks are re-evaluated and export their error, or `null` when healthy.
pub fn append_metric_fields(record: &mut ExportRecord, name: &str, metric: &Metric) {
    let name = match parse_tagged_metric(name) {
        Some((base, board)) => {
            for (key, value) in board.iter() {
                record.insert(key, value);
            }
            base
        },
        None => name,
    };

    match metric {
        Metric::Counter(counter) => record.insert(name, counter.count()),
        Metric::Gauge(gauge) => record.insert(name, gauge.value()),
        Metric::GaugeFloat64(gauge) => record.insert(name, gauge.value()),
        Metric::InstantCounter(counter) => record.insert(name, counter.count()),
        Metric::Healthcheck(healthcheck) => {
            healthcheck.check();
            record.insert(name, healthcheck.error().map_or(Value::Null, Value::from));
        },
        Metric::Histogram(histogram) => {
            record.insert(format!("{name}_avg"), histogram.snapshot().mean());
        },
        Metric::Meter(meter) => {
            let snapshot = meter.snapshot();
            record.insert(format!("{name}_1MR"), snapshot.rate1);
            record.insert(format!("{name}_5MR"), snapshot.rate5);
            record.insert(format!("{name}_15MR"), snapshot.rate15);
            record.insert(format!("{name}_avg"), snapshot.rate_mean);
        },
        Metric::Timer(timer) => {
            let seconds = Duration::from_secs(1);
            let snapshot = timer.snapshot();
            record.insert(format!("{name}_avg"), snapshot.mean_in(seconds));
            let quantiles = TIMER_QUANTILES.map(|(quantile, _)| quantile);
            let values = snapshot.percentiles_in(&quantiles, seconds);
            for ((_, suffix), value) in TIMER_QUANTILES.iter().zip(values) {
                record.insert(format!("{name}{suffix}"), value);
            }
        },
    }
}
