//! Last-value gauges.

use portable_atomic::AtomicF64;
use std::sync::atomic::{AtomicI64, Ordering};

/// `i64` gauge holding the last value written.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    /// Create a gauge at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: AtomicI64::new(0),
        }
    }

    /// Replace the value.
    pub fn update(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// `f64` gauge holding the last value written.
#[derive(Debug)]
pub struct GaugeFloat64 {
    value: AtomicF64,
}

impl GaugeFloat64 {
    /// Create a gauge at `0.0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: AtomicF64::new(0.0),
        }
    }

    /// Replace the value.
    pub fn update(&self, value: f64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for GaugeFloat64 {
    fn default() -> Self {
        Self::new()
    }
}
