//! Periodic human-readable registry dumps through `tracing`.

use optron_metrics::{Metric, Registry};
use optron_shared::CancellationToken;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const REPORT_QUANTILES: [f64; 5] = [0.5, 0.75, 0.95, 0.99, 0.999];

/// Logs every metric of a registry on a fixed interval.
#[derive(Clone)]
pub struct LogReporter {
    registry: Arc<dyn Registry>,
    interval: Duration,
    scale: Duration,
}

impl LogReporter {
    /// Reporter for `registry`, printing timer durations in nanoseconds.
    pub fn new(registry: Arc<dyn Registry>, interval: Duration) -> Self {
        Self {
            registry,
            interval,
            scale: Duration::from_nanos(1),
        }
    }

    /// Print timer durations in multiples of `scale`, e.g. one millisecond.
    #[must_use]
    pub fn with_scale(mut self, scale: Duration) -> Self {
        if !scale.is_zero() {
            self.scale = scale;
        }
        self
    }

    /// Lines for one pass over the registry, in name order.
    ///
    /// Healthchecks are re-evaluated. Instant counters are peeked, not drained.
    pub fn render(&self) -> Vec<String> {
        let suffix = unit_suffix(self.scale);
        let scale = self.scale.as_nanos() as f64;
        let mut lines = Vec::new();
        self.registry.each(&mut |name, metric| {
            render_metric(&mut lines, name, metric, scale, &suffix);
        });
        lines
    }

    /// Log on every tick until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {},
            }
            for line in self.render() {
                tracing::info!(target: "optron::report", "{line}");
            }
        }
    }

    /// Run on the current tokio runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

impl std::fmt::Debug for LogReporter {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("LogReporter")
            .field("interval", &self.interval)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

fn render_metric(lines: &mut Vec<String>, name: &str, metric: &Metric, scale: f64, suffix: &str) {
    match metric {
        Metric::Counter(counter) => {
            lines.push(format!("counter {name}"));
            lines.push(format!("  count:       {:9}", counter.count()));
        },
        Metric::InstantCounter(counter) => {
            lines.push(format!("counter {name}"));
            lines.push(format!("  count:       {:9}", counter.peek()));
        },
        Metric::Gauge(gauge) => {
            lines.push(format!("gauge {name}"));
            lines.push(format!("  value:       {:9}", gauge.value()));
        },
        Metric::GaugeFloat64(gauge) => {
            lines.push(format!("gauge {name}"));
            lines.push(format!("  value:       {:.6}", gauge.value()));
        },
        Metric::Healthcheck(healthcheck) => {
            healthcheck.check();
            lines.push(format!("healthcheck {name}"));
            lines.push(format!(
                "  error:       {}",
                healthcheck.error().as_deref().unwrap_or("none")
            ));
        },
        Metric::Histogram(histogram) => {
            let h = histogram.snapshot();
            let [median, p75, p95, p99, p999] = quantiles(h.percentiles(&REPORT_QUANTILES));
            lines.push(format!("histogram {name}"));
            lines.push(format!("  count:       {:9}", h.count()));
            lines.push(format!("  min:         {:9}", h.min()));
            lines.push(format!("  max:         {:9}", h.max()));
            lines.push(format!("  mean:        {:12.2}", h.mean()));
            lines.push(format!("  stddev:      {:12.2}", h.std_dev()));
            lines.push(format!("  median:      {median:12.2}"));
            lines.push(format!("  75%:         {p75:12.2}"));
            lines.push(format!("  95%:         {p95:12.2}"));
            lines.push(format!("  99%:         {p99:12.2}"));
            lines.push(format!("  99.9%:       {p999:12.2}"));
        },
        Metric::Meter(meter) => {
            let m = meter.snapshot();
            lines.push(format!("meter {name}"));
            lines.push(format!("  count:       {:9}", m.count));
            push_rates(lines, m.rate1, m.rate5, m.rate15, m.rate_mean);
        },
        Metric::Timer(timer) => {
            let t = timer.snapshot();
            let h = &t.histogram;
            let [median, p75, p95, p99, p999] =
                quantiles(h.percentiles(&REPORT_QUANTILES)).map(|value| value / scale);
            lines.push(format!("timer {name}"));
            lines.push(format!("  count:       {:9}", h.count()));
            lines.push(format!("  min:         {:12.2}{suffix}", h.min() as f64 / scale));
            lines.push(format!("  max:         {:12.2}{suffix}", h.max() as f64 / scale));
            lines.push(format!("  mean:        {:12.2}{suffix}", h.mean() / scale));
            lines.push(format!("  stddev:      {:12.2}{suffix}", h.std_dev() / scale));
            lines.push(format!("  median:      {median:12.2}{suffix}"));
            lines.push(format!("  75%:         {p75:12.2}{suffix}"));
            lines.push(format!("  95%:         {p95:12.2}{suffix}"));
            lines.push(format!("  99%:         {p99:12.2}{suffix}"));
            lines.push(format!("  99.9%:       {p999:12.2}{suffix}"));
            push_rates(lines, t.meter.rate1, t.meter.rate5, t.meter.rate15, t.meter.rate_mean);
        },
    }
}

fn push_rates(lines: &mut Vec<String>, rate1: f64, rate5: f64, rate15: f64, mean: f64) {
    lines.push(format!("  1-min rate:  {rate1:12.2}"));
    lines.push(format!("  5-min rate:  {rate5:12.2}"));
    lines.push(format!("  15-min rate: {rate15:12.2}"));
    lines.push(format!("  mean rate:   {mean:12.2}"));
}

fn quantiles(values: Vec<f64>) -> [f64; 5] {
    <[f64; 5]>::try_from(values).unwrap_or([0.0; 5])
}

/// `ms` for one millisecond, `µs` for one microsecond, and so on.
fn unit_suffix(scale: Duration) -> String {
    let rendered = format!("{scale:?}");
    rendered
        .strip_prefix('1')
        .filter(|rest| rest.starts_with(|c: char| c.is_alphabetic()))
        .map_or_else(|| rendered.clone(), str::to_owned)
}
