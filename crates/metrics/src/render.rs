//! Human-readable rendering of registry contents.

use crate::metric::Metric;
use crate::registry::Registry;
use std::fmt::Write as _;
use std::time::Duration;

/// First line of [`render_current`] output.
pub const CURRENT_HEADER: &str = "<--------Metrics--------->\n";

const SUMMARY_QUANTILES: [f64; 5] = [0.5, 0.8, 0.9, 0.99, 0.999];

/// Render every metric of `registry`, one `Metrics: name: value` line each,
/// in the same order as [`Registry::each`].
///
/// Healthchecks are re-evaluated. Instant counters are peeked, not drained.
pub fn render_current<R: Registry + ?Sized>(registry: &R) -> String {
    let mut out = String::from(CURRENT_HEADER);
    registry.each(&mut |name, metric| {
        let _ = writeln!(out, "Metrics: {name}: {}", summarize(metric));
    });
    out
}

/// One-line summary of a metric's current value.
#[must_use]
pub fn summarize(metric: &Metric) -> String {
    let seconds = Duration::from_secs(1);
    match metric {
        Metric::Counter(counter) => counter.count().to_string(),
        Metric::Gauge(gauge) => gauge.value().to_string(),
        Metric::GaugeFloat64(gauge) => format!("{:.6}", gauge.value()),
        Metric::InstantCounter(counter) => counter.peek().to_string(),
        Metric::Healthcheck(healthcheck) => {
            healthcheck.check();
            healthcheck.error().unwrap_or_else(|| "healthy".to_owned())
        },
        Metric::Histogram(histogram) => {
            let h = histogram.snapshot();
            let [median, p80, p90, p99, p999] = summary_quantiles(h.percentiles(&SUMMARY_QUANTILES));
            format!(
                "count: {}, min: {}, max: {}, mean: {:.6}, stddev: {:.6}, median: {:.6}, 80%: {:.6}, 90%: {:.6}, 99%: {:.6}, 99.9%: {:.6}",
                h.count(),
                h.min(),
                h.max(),
                h.mean(),
                h.std_dev(),
                median,
                p80,
                p90,
                p99,
                p999,
            )
        },
        Metric::Meter(meter) => {
            let m = meter.snapshot();
            format!(
                "count: {}, 1MR: {:.6}, 5MR: {:.6}, 15MR: {:.6}, mean: {:.6}",
                m.count, m.rate1, m.rate5, m.rate15, m.rate_mean
            )
        },
        Metric::Timer(timer) => {
            let t = timer.snapshot();
            let [median, p80, p90, p99, p999] =
                summary_quantiles(t.percentiles_in(&SUMMARY_QUANTILES, seconds));
            let scale = seconds.as_nanos() as f64;
            format!(
                "count: {}, min: {:.6}, max: {:.6}, mean: {:.6}, stddev: {:.6}, median: {:.6}, 80%: {:.6}, 90%: {:.6}, 99%: {:.6}, 99.9%: {:.6}, 1MR: {:.6}, 5MR: {:.6}, 15MR: {:.6}, meanRate: {:.6}",
                t.histogram.count(),
                t.histogram.min() as f64 / scale,
                t.histogram.max() as f64 / scale,
                t.mean_in(seconds),
                t.histogram.std_dev() / scale,
                median,
                p80,
                p90,
                p99,
                p999,
                t.meter.rate1,
                t.meter.rate5,
                t.meter.rate15,
                t.meter.rate_mean,
            )
        },
    }
}

fn summary_quantiles(values: Vec<f64>) -> [f64; 5] {
    <[f64; 5]>::try_from(values).unwrap_or([0.0; 5])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Counter, Gauge, Healthcheck, InstantCounter, StandardRegistry};

    #[test]
    fn renders_sorted_lines_after_header() -> Result<(), crate::RegistryError> {
        let registry = StandardRegistry::new();
        let gauge = Gauge::new();
        gauge.update(-3);
        registry.register("b.gauge", Metric::from(gauge))?;
        let counter = Counter::new();
        counter.inc(2);
        registry.register("a.counter", Metric::from(counter))?;
        registry.register("c.health", Metric::from(Healthcheck::new(|| Err("down".to_owned()))))?;

        let rendered = render_current(&registry);
        assert_eq!(
            rendered,
            "<--------Metrics--------->\nMetrics: a.counter: 2\nMetrics: b.gauge: -3\nMetrics: c.health: down\n"
        );
        Ok(())
    }

    #[test]
    fn instant_counter_is_not_drained() {
        let counter = InstantCounter::new();
        counter.inc(5);
        let metric = Metric::from(counter);
        assert_eq!(summarize(&metric), "5");
        assert_eq!(summarize(&metric), "5");
    }
}
