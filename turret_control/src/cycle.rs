//! Supervisory cycle: wiring and the fixed-interval tick.
//!
//! [`Turret::build`] creates the five components from a [`TurretConfig`]
//! and a driver set. [`CycleRunner::tick`] advances them in a fixed order:
//!
//! 1. safety update (arm sync, emergency stop, watchdog, brownout, auto-off)
//! 2. actuator tick (movement watchdog before interpolation), then the
//!    remaining interpolation steps one step period apart
//! 3. emitter update (max on-time, cooldown expiry)
//! 4. targeting update (loss timeout, sweep)
//!
//! Detection batches arrive outside the tick through
//! [`TargetingEngine::process_detections`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};
use turret_common::clock::Clock;
use turret_common::config::ConfigError;
use turret_hal::DriverSet;

use crate::config::TurretConfig;
use crate::emitter::{EmitterController, EmitterError};
use crate::mapper::calibration::CalibrationStore;
use crate::mapper::{CoordinateMapper, MapperError};
use crate::safety::{ArmInput, SafetyLayer};
use crate::servo::{ServoController, ServoError};
use crate::targeting::TargetingEngine;

#[derive(Debug, Error)]
pub enum TurretError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("coordinate mapper: {0}")]
    Mapper(#[from] MapperError),

    #[error("actuator: {0}")]
    Servo(#[from] ServoError),

    #[error("emitter: {0}")]
    Emitter(#[from] EmitterError),
}

// ─── Cycle Statistics ───────────────────────────────────────────────

/// Per-tick timing, O(1) per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub tick_count: u64,
    pub last_tick: Duration,
    pub max_tick: Duration,
    pub total: Duration,
    /// Ticks that took longer than the interval.
    pub overruns: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            tick_count: 0,
            last_tick: Duration::ZERO,
            max_tick: Duration::ZERO,
            total: Duration::ZERO,
            overruns: 0,
        }
    }

    #[inline]
    pub fn record(&mut self, took: Duration, budget: Duration) {
        self.tick_count += 1;
        self.last_tick = took;
        self.total += took;
        if took > self.max_tick {
            self.max_tick = took;
        }
        if took > budget {
            self.overruns += 1;
        }
    }

    /// Average tick duration (zero before the first tick).
    pub fn avg_tick(&self) -> Duration {
        if self.tick_count == 0 {
            Duration::ZERO
        } else {
            let nanos = self.total.as_nanos() / u128::from(self.tick_count);
            Duration::from_nanos(nanos as u64)
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Wiring ─────────────────────────────────────────────────────────

/// The assembled control core.
pub struct Turret {
    pub mapper: Arc<CoordinateMapper>,
    pub emitter: Arc<EmitterController>,
    pub servo: Arc<ServoController>,
    pub safety: Arc<SafetyLayer>,
    pub targeting: Arc<TargetingEngine>,
}

impl Turret {
    /// Validate `config`, initialize the drivers and wire the components.
    ///
    /// A missing or malformed calibration file is not an error: the mapper
    /// starts with identity calibration.
    pub fn build(
        config: &TurretConfig,
        drivers: DriverSet,
        arm: Arc<dyn ArmInput>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TurretError> {
        config.validate()?;

        let store = CalibrationStore::new(&config.calibration.path);
        let mapper = CoordinateMapper::new(config.camera)?.with_store(store);
        mapper.load_or_identity(&config.calibration.path);
        let mapper = Arc::new(mapper);

        let emitter = Arc::new(EmitterController::new(
            drivers.emitter,
            &config.emitter,
            clock.clone(),
        )?);
        let servo = Arc::new(ServoController::new(
            drivers.servo,
            &config.servo,
            emitter.clone(),
            drivers.indicator,
            clock.clone(),
        )?);
        let safety = Arc::new(SafetyLayer::new(
            &config.safety,
            emitter.clone(),
            servo.clone(),
            arm,
            clock.clone(),
        ));
        let targeting = Arc::new(TargetingEngine::new(
            &config.targeting,
            mapper.clone(),
            servo.clone(),
            emitter.clone(),
            safety.clone(),
            clock,
        ));

        info!("Turret core assembled");
        Ok(Self {
            mapper,
            emitter,
            servo,
            safety,
            targeting,
        })
    }

    /// Emitter off, tracking stopped, actuator parked at home.
    pub fn shutdown(&self) {
        info!("Turret shutting down");
        self.targeting.cancel();
        self.safety.deactivate();
        self.emitter.shutdown();
        self.servo.shutdown();
    }
}

// ─── Runner ─────────────────────────────────────────────────────────

/// Fixed-interval supervisory loop over a [`Turret`].
pub struct CycleRunner {
    turret: Turret,
    interval: Duration,
    step: Duration,
    steps_per_tick: u32,
    clock: Arc<dyn Clock>,
    stats: CycleStats,
}

impl CycleRunner {
    pub fn new(turret: Turret, interval: Duration, clock: Arc<dyn Clock>) -> Self {
        let step = turret.servo.step_interval();
        let steps_per_tick = (interval.as_nanos() / step.as_nanos()).max(1) as u32;
        Self {
            turret,
            interval,
            step,
            steps_per_tick,
            clock,
            stats: CycleStats::new(),
        }
    }

    /// One supervisory tick.
    pub fn tick(&mut self) {
        let start = self.clock.now();

        self.turret.safety.update();
        self.step_actuator();
        self.turret.emitter.update();
        self.turret.targeting.update();

        let took = self.clock.now().saturating_sub(start);
        self.stats.record(took, self.interval);
        if took > self.interval {
            warn!(
                "Tick overrun: {} us (interval {} ms)",
                took.as_micros(),
                self.interval.as_millis()
            );
        }
    }

    /// Watchdog and first step, then the remaining steps of a move one step
    /// period apart, bounded by the interval.
    fn step_actuator(&self) {
        let servo = &self.turret.servo;
        let mut moving = servo.tick();
        for _ in 1..self.steps_per_tick {
            if !moving {
                break;
            }
            self.clock.sleep(self.step);
            moving = servo.step();
        }
    }

    /// Tick at the configured interval until `running` is cleared.
    ///
    /// Each completed tick feeds the safety watchdog, so a stalled loop
    /// drives the system into safe mode.
    pub fn run(&mut self, running: &AtomicBool) {
        info!("Entering supervisory loop ({} ms)", self.interval.as_millis());
        let mut next = Instant::now();
        while running.load(Ordering::SeqCst) {
            self.tick();
            self.turret.safety.feed_watchdog();

            next += self.interval;
            let now = Instant::now();
            if next > now {
                std::thread::sleep(next - now);
            } else {
                // Fell behind: restart pacing from now instead of bursting.
                next = now;
            }
        }
        debug!(
            "Supervisory loop left after {} ticks (avg {} us, max {} us, {} overruns)",
            self.stats.tick_count,
            self.stats.avg_tick().as_micros(),
            self.stats.max_tick.as_micros(),
            self.stats.overruns
        );
    }

    pub fn turret(&self) -> &Turret {
        &self.turret
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop and park. Consumes the runner.
    pub fn shutdown(self) {
        self.turret.shutdown();
    }
}
