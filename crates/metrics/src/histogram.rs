//! Value distributions backed by an HDR histogram.

use hdrhistogram::CreationError;
use std::sync::{Mutex, PoisonError};

/// Significant decimal digits kept by every histogram.
pub const SIGNIFICANT_DIGITS: u8 = 3;

/// Distribution of `i64` samples.
///
/// Negative samples are clamped to zero.
#[derive(Debug)]
pub struct Histogram {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

impl Histogram {
    /// Create an auto-resizing histogram.
    pub fn new() -> Result<Self, CreationError> {
        let inner = hdrhistogram::Histogram::new(SIGNIFICANT_DIGITS)?;
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }

    /// Record one sample, growing the trackable range as needed.
    pub fn update(&self, value: i64) {
        let sample = u64::try_from(value).unwrap_or(0);
        let mut inner = self.lock();
        if let Err(error) = inner.record(sample) {
            tracing::debug!(sample, error = %error, "metrics.histogram_clamped");
            inner.saturating_record(sample);
        }
    }

    /// Drop every recorded sample.
    pub fn clear(&self) {
        self.lock().reset();
    }

    /// Number of samples recorded.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.lock().len()
    }

    /// Immutable copy of the current distribution.
    #[must_use]
    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            inner: self.lock().clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, hdrhistogram::Histogram<u64>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time read of a [`Histogram`].
#[derive(Debug, Clone)]
pub struct HistogramSnapshot {
    inner: hdrhistogram::Histogram<u64>,
}

impl HistogramSnapshot {
    /// Number of samples.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.inner.len()
    }

    /// Smallest sample, zero when empty.
    #[must_use]
    pub fn min(&self) -> i64 {
        if self.inner.is_empty() {
            return 0;
        }
        clamp_i64(self.inner.min())
    }

    /// Largest sample, zero when empty.
    #[must_use]
    pub fn max(&self) -> i64 {
        if self.inner.is_empty() {
            return 0;
        }
        clamp_i64(self.inner.max())
    }

    /// Arithmetic mean, zero when empty.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.inner.is_empty() {
            return 0.0;
        }
        self.inner.mean()
    }

    /// Standard deviation, zero when empty.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        if self.inner.is_empty() {
            return 0.0;
        }
        self.inner.stdev()
    }

    /// Value at quantile `q` (`0.0..=1.0`).
    #[must_use]
    pub fn percentile(&self, q: f64) -> f64 {
        if self.inner.is_empty() {
            return 0.0;
        }
        self.inner.value_at_quantile(q.clamp(0.0, 1.0)) as f64
    }

    /// Values at each requested quantile, in request order.
    #[must_use]
    pub fn percentiles(&self, quantiles: &[f64]) -> Vec<f64> {
        quantiles.iter().map(|q| self.percentile(*q)).collect()
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
