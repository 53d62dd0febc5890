//! Event rates with exponentially-weighted moving averages.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Period between two moving-average ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
struct Ewma {
    alpha: f64,
    rate: f64,
    initialized: bool,
}

impl Ewma {
    fn for_minutes(minutes: f64) -> Self {
        let ticks_per_window = minutes * 60.0 / TICK_INTERVAL.as_secs_f64();
        Self {
            alpha: 1.0 - (-1.0 / ticks_per_window).exp(),
            rate: 0.0,
            initialized: false,
        }
    }

    fn tick(&mut self, uncounted: i64) {
        let instant_rate = uncounted as f64 / TICK_INTERVAL.as_secs_f64();
        if self.initialized {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }
    }

    fn decay(&mut self, idle_ticks: u32) {
        if self.initialized && idle_ticks > 0 {
            let exponent = i32::try_from(idle_ticks).unwrap_or(i32::MAX);
            self.rate *= (1.0 - self.alpha).powi(exponent);
        }
    }
}

#[derive(Debug)]
struct MeterState {
    count: i64,
    uncounted: i64,
    rates: [Ewma; 3],
    started: Instant,
    last_tick: Instant,
}

impl MeterState {
    fn advance(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_tick);
        let ticks = elapsed.as_nanos() / TICK_INTERVAL.as_nanos();
        if ticks == 0 {
            return;
        }
        let ticks = u32::try_from(ticks).unwrap_or(u32::MAX);
        let uncounted = std::mem::take(&mut self.uncounted);
        for ewma in &mut self.rates {
            ewma.tick(uncounted);
            ewma.decay(ticks - 1);
        }
        self.last_tick += TICK_INTERVAL * ticks;
    }
}

/// Counts events and tracks their 1, 5 and 15 minute rates.
///
/// Averages are ticked lazily whenever the meter is marked or read.
#[derive(Debug)]
pub struct Meter {
    state: Mutex<MeterState>,
}

impl Meter {
    /// Create a meter starting now.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub(crate) fn starting_at(now: Instant) -> Self {
        Self {
            state: Mutex::new(MeterState {
                count: 0,
                uncounted: 0,
                rates: [Ewma::for_minutes(1.0), Ewma::for_minutes(5.0), Ewma::for_minutes(15.0)],
                started: now,
                last_tick: now,
            }),
        }
    }

    /// Record `events` occurrences.
    pub fn mark(&self, events: i64) {
        self.mark_at(events, Instant::now());
    }

    pub(crate) fn mark_at(&self, events: i64, now: Instant) {
        let mut state = self.lock();
        state.advance(now);
        state.count = state.count.saturating_add(events);
        state.uncounted = state.uncounted.saturating_add(events);
    }

    /// Total events recorded.
    #[must_use]
    pub fn count(&self) -> i64 {
        self.lock().count
    }

    /// Point-in-time read of count and rates.
    #[must_use]
    pub fn snapshot(&self) -> MeterSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub(crate) fn snapshot_at(&self, now: Instant) -> MeterSnapshot {
        let mut state = self.lock();
        state.advance(now);
        let elapsed = now.saturating_duration_since(state.started).as_secs_f64();
        let rate_mean = if elapsed > 0.0 {
            state.count as f64 / elapsed
        } else {
            0.0
        };
        let [one, five, fifteen] = &state.rates;
        MeterSnapshot {
            count: state.count,
            rate1: one.rate,
            rate5: five.rate,
            rate15: fifteen.rate,
            rate_mean,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MeterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

/// Rates in events per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterSnapshot {
    /// Total events.
    pub count: i64,
    /// One-minute moving average.
    pub rate1: f64,
    /// Five-minute moving average.
    pub rate5: f64,
    /// Fifteen-minute moving average.
    pub rate15: f64,
    /// Events divided by the meter's age.
    pub rate_mean: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_saturates_instead_of_overflowing() {
        let start = Instant::now();
        let meter = Meter::starting_at(start);
        meter.mark_at(i64::MAX, start);
        meter.mark_at(i64::MAX, start);
        meter.mark_at(1, start);
        assert_eq!(meter.count(), i64::MAX);

        let snapshot = meter.snapshot_at(start + TICK_INTERVAL);
        assert_eq!(snapshot.count, i64::MAX);
        assert!(snapshot.rate1.is_finite());
    }

    #[test]
    fn first_tick_seeds_every_average() {
        let start = Instant::now();
        let meter = Meter::starting_at(start);
        meter.mark_at(60, start);

        let snapshot = meter.snapshot_at(start + TICK_INTERVAL);
        assert_eq!(snapshot.count, 60);
        assert!((snapshot.rate1 - 12.0).abs() < 1e-9);
        assert!((snapshot.rate5 - 12.0).abs() < 1e-9);
        assert!((snapshot.rate15 - 12.0).abs() < 1e-9);
        assert!((snapshot.rate_mean - 12.0).abs() < 1e-9);
    }

    #[test]
    fn idle_ticks_decay_short_window_fastest() {
        let start = Instant::now();
        let meter = Meter::starting_at(start);
        meter.mark_at(60, start);

        let snapshot = meter.snapshot_at(start + Duration::from_secs(60));
        assert!(snapshot.rate1 < snapshot.rate5);
        assert!(snapshot.rate5 < snapshot.rate15);
        assert!(snapshot.rate15 < 12.0);
        assert!(snapshot.rate1 > 0.0);
    }

    #[test]
    fn reads_before_first_tick_are_zero() {
        let start = Instant::now();
        let meter = Meter::starting_at(start);
        meter.mark_at(3, start);
        let snapshot = meter.snapshot_at(start);
        assert_eq!(snapshot.count, 3);
        assert!(snapshot.rate1.abs() < f64::EPSILON);
        assert!(snapshot.rate_mean.abs() < f64::EPSILON);
    }
}
