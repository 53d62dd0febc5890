//! Duration distributions paired with a call-rate meter.

use crate::histogram::{Histogram, HistogramSnapshot};
use crate::meter::{Meter, MeterSnapshot};
use hdrhistogram::CreationError;
use std::time::{Duration, Instant};

/// Records durations in nanoseconds and how often they occur.
#[derive(Debug)]
pub struct Timer {
    histogram: Histogram,
    meter: Meter,
}

impl Timer {
    /// Create an empty timer.
    pub fn new() -> Result<Self, CreationError> {
        Ok(Self {
            histogram: Histogram::new()?,
            meter: Meter::new(),
        })
    }

    /// Record one duration.
    pub fn update(&self, elapsed: Duration) {
        let nanos = i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX);
        self.histogram.update(nanos);
        self.meter.mark(1);
    }

    /// Record the time elapsed since `start`.
    pub fn update_since(&self, start: Instant) {
        self.update(start.elapsed());
    }

    /// Run `f` and record how long it took.
    pub fn time<R>(&self, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let result = f();
        self.update_since(start);
        result
    }

    /// Number of recorded durations.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.histogram.count()
    }

    /// Point-in-time read of the distribution and rates.
    #[must_use]
    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            histogram: self.histogram.snapshot(),
            meter: self.meter.snapshot(),
        }
    }
}

/// Distribution in nanoseconds plus call rates.
#[derive(Debug, Clone)]
pub struct TimerSnapshot {
    /// Recorded durations, in nanoseconds.
    pub histogram: HistogramSnapshot,
    /// Calls per second.
    pub meter: MeterSnapshot,
}

impl TimerSnapshot {
    /// Mean duration divided by `unit`.
    #[must_use]
    pub fn mean_in(&self, unit: Duration) -> f64 {
        self.histogram.mean() / unit_nanos(unit)
    }

    /// Durations at each quantile divided by `unit`.
    #[must_use]
    pub fn percentiles_in(&self, quantiles: &[f64], unit: Duration) -> Vec<f64> {
        let scale = unit_nanos(unit);
        self.histogram
            .percentiles(quantiles)
            .into_iter()
            .map(|value| value / scale)
            .collect()
    }
}

fn unit_nanos(unit: Duration) -> f64 {
    let nanos = unit.as_nanos() as f64;
    if nanos > 0.0 { nanos } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_scale_to_requested_unit() -> Result<(), CreationError> {
        let timer = Timer::new()?;
        timer.update(Duration::from_millis(200));
        timer.update(Duration::from_millis(400));

        let snapshot = timer.snapshot();
        assert_eq!(snapshot.histogram.count(), 2);
        assert_eq!(snapshot.meter.count, 2);
        assert!((snapshot.mean_in(Duration::from_secs(1)) - 0.3).abs() < 0.01);

        let p99 = snapshot.percentiles_in(&[0.99], Duration::from_millis(1));
        assert!((p99[0] - 400.0).abs() < 1.0);
        Ok(())
    }

    #[test]
    fn time_returns_closure_output() -> Result<(), CreationError> {
        let timer = Timer::new()?;
        let value = timer.time(|| 7);
        assert_eq!(value, 7);
        assert_eq!(timer.count(), 1);
        Ok(())
    }
}
