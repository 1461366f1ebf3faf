//! Monotonic time source.
//!
//! Every timing decision in the control core (interpolation, on-time limits,
//! cooldown, loss timeout, watchdog) reads time through [`Clock`], so tests
//! can drive time explicitly with [`ManualClock`] instead of sleeping.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time source. `now()` never decreases.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's epoch.
    fn now(&self) -> Duration;

    /// Block for `dt` of this clock's time.
    fn sleep(&self, dt: Duration) {
        std::thread::sleep(dt);
    }
}

/// Wall clock backed by [`Instant`], epoch at construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Manually advanced clock for tests and simulation.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by `dt`.
    pub fn advance(&self, dt: Duration) {
        *self.now.lock() += dt;
    }

    /// Advance by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Jump to an absolute time. Ignored if it would move backwards.
    pub fn set(&self, t: Duration) {
        let mut now = self.now.lock();
        if t > *now {
            *now = t;
        }
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> Duration {
        *self.now.lock()
    }

    /// Returns immediately. Time only moves through `advance` and `set`.
    fn sleep(&self, _dt: Duration) {}
}

/// Milliseconds between two clock readings, zero if `later < earlier`.
#[inline]
pub fn elapsed_ms(earlier: Duration, later: Duration) -> u64 {
    later.saturating_sub(earlier).as_millis() as u64
}
