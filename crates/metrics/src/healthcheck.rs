//! User-defined health probes.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

type CheckFn = dyn Fn() -> Result<(), String> + Send + Sync;

/// Probe whose last failure is kept until the next check.
pub struct Healthcheck {
    check: Box<CheckFn>,
    error: Mutex<Option<String>>,
}

impl Healthcheck {
    /// Create a healthcheck that starts healthy.
    pub fn new(check: impl Fn() -> Result<(), String> + Send + Sync + 'static) -> Self {
        Self {
            check: Box::new(check),
            error: Mutex::new(None),
        }
    }

    /// Re-evaluate the probe and store its outcome.
    pub fn check(&self) {
        let outcome = (self.check)().err();
        *self.lock() = outcome;
    }

    /// Last recorded failure.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.lock().clone()
    }

    /// Mark healthy.
    pub fn healthy(&self) {
        *self.lock() = None;
    }

    /// Mark unhealthy with `message`.
    pub fn unhealthy(&self, message: impl Into<String>) {
        *self.lock() = Some(message.into());
    }

    fn lock(&self) -> MutexGuard<'_, Option<String>> {
        self.error.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Healthcheck {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Healthcheck")
            .field("error", &self.error())
            .finish_non_exhaustive()
    }
}
