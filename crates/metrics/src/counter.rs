//! Integer counters.

use std::sync::atomic::{AtomicI64, Ordering};

/// Monotonic-by-convention `i64` counter that can be incremented and decremented.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    /// Create a counter at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: AtomicI64::new(0),
        }
    }

    /// Reset the counter to zero.
    pub fn clear(&self) {
        self.count.store(0, Ordering::Relaxed);
    }

    /// Current count.
    #[must_use]
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Decrement by `value`.
    pub fn dec(&self, value: i64) {
        self.count.fetch_sub(value, Ordering::Relaxed);
    }

    /// Increment by `value`.
    pub fn inc(&self, value: i64) {
        self.count.fetch_add(value, Ordering::Relaxed);
    }

    /// Same as [`Counter::inc`].
    pub fn update(&self, value: i64) {
        self.inc(value);
    }
}

/// Counter whose read drains it: every [`InstantCounter::count`] returns what
/// accumulated since the previous read and leaves zero behind.
#[derive(Debug, Default)]
pub struct InstantCounter {
    count: AtomicI64,
}

impl InstantCounter {
    /// Create an instant counter at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: AtomicI64::new(0),
        }
    }

    /// Read and reset in one atomic step, so no concurrent increment is lost.
    pub fn count(&self) -> i64 {
        self.count.swap(0, Ordering::AcqRel)
    }

    /// Read without clearing.
    #[must_use]
    pub fn peek(&self) -> i64 {
        self.count.load(Ordering::Acquire)
    }

    /// Reset to zero.
    pub fn clear(&self) {
        self.count.store(0, Ordering::Release);
    }

    /// Decrement by `value`.
    pub fn dec(&self, value: i64) {
        self.count.fetch_sub(value, Ordering::AcqRel);
    }

    /// Increment by `value`.
    pub fn inc(&self, value: i64) {
        self.count.fetch_add(value, Ordering::AcqRel);
    }

    /// Same as [`InstantCounter::inc`].
    pub fn update(&self, value: i64) {
        self.inc(value);
    }
}
