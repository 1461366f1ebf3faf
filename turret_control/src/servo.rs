//! Actuator controller: pan/tilt position, interpolated motion, movement watchdog.
//!
//! Moves are never instantaneous. `move_to` clamps the request, records it
//! as the target and returns. The motion is split into `move_time / step`
//! fixed steps and every call to `tick` or `step` writes exactly one of
//! them, so the caller paces the motion by calling once per step period.
//! `tick` runs the watchdog before its step, so a fault tripped this tick
//! preempts motion; `step` is for the further steps within one tick.
//!
//! On a watchdog trip the controller releases its lock, then forces the
//! emitter off and disarmed, raises the fault indicator and fires the
//! failure callback. The trip is latched until `clear_fault`.

pub mod pwm;
pub mod watchdog;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use turret_common::clock::{Clock, elapsed_ms};
use turret_common::hal::driver::{FaultIndicator, HalError, ServoDriver};
use turret_common::types::{Axis, ServoPosition};

use crate::config::ServoConfig;
use crate::emitter::EmitterController;

pub use pwm::{angle_to_pulse_us, is_angle_valid, pulse_us_to_angle};
pub use watchdog::{WatchdogResult, evaluate_motion};

/// Self-test polling interval.
const SELF_TEST_POLL: Duration = Duration::from_millis(10);
/// Polls allowed per self-test step before it counts as a timeout.
const SELF_TEST_MAX_POLLS: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServoError {
    #[error("actuator fault latched on {0} axis")]
    HardwareFault(Axis),

    #[error("servo output: {0}")]
    Driver(#[from] HalError),

    #[error("self-test failed at step {step} ({reason})")]
    SelfTestFailed { step: usize, reason: &'static str },
}

/// How a move request was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Accepted,
    /// At least one axis was outside its safe range and was clamped.
    Clamped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServoStats {
    pub move_count: u32,
    pub clamp_count: u32,
    pub write_errors: u32,
    pub watchdog_trips: u32,
    pub hardware_ok: bool,
}

/// Called once per failure episode with the failing axis.
pub type ServoFailureCallback = Arc<dyn Fn(Axis) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct Motion {
    from: ServoPosition,
    to: ServoPosition,
    steps_done: u32,
}

struct ServoInner {
    driver: Box<dyn ServoDriver>,
    config: ServoConfig,
    current: ServoPosition,
    target: ServoPosition,
    motion: Option<Motion>,
    last_progress: Duration,
    consecutive_failures: u32,
    hardware_ok: bool,
    last_failed_axis: Axis,
    stats: ServoStats,
    on_failure: Option<ServoFailureCallback>,
}

impl ServoInner {
    fn write(&mut self, pos: ServoPosition) -> Result<(), HalError> {
        for axis in Axis::ALL {
            if let Err(e) = self.driver.set_pulse_us(axis, angle_to_pulse_us(axis, pos.get(axis))) {
                self.last_failed_axis = axis;
                self.stats.write_errors += 1;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Write the next interpolation step.
    fn interpolate(&mut self, now: Duration) {
        let Some(mut motion) = self.motion else {
            return;
        };
        let steps = self.config.steps();
        let due = (motion.steps_done + 1).min(steps);

        let t = due as f32 / steps as f32;
        let pos = ServoPosition::new(
            motion.from.pan_deg + (motion.to.pan_deg - motion.from.pan_deg) * t,
            motion.from.tilt_deg + (motion.to.tilt_deg - motion.from.tilt_deg) * t,
        );
        match self.write(pos) {
            Ok(()) => {
                self.current = pos;
                self.last_progress = now;
                motion.steps_done = due;
                if due >= steps {
                    self.current = motion.to;
                    self.motion = None;
                    self.consecutive_failures = 0;
                    debug!(
                        "Move complete: pan={:.1} tilt={:.1}",
                        self.current.pan_deg, self.current.tilt_deg
                    );
                } else {
                    self.motion = Some(motion);
                }
            }
            Err(e) => {
                debug!("Interpolation step {} not written: {e}", due);
            }
        }
    }
}

/// Thread-safe pan/tilt actuator controller.
pub struct ServoController {
    inner: Mutex<ServoInner>,
    emitter: Arc<EmitterController>,
    indicator: Arc<dyn FaultIndicator>,
    clock: Arc<dyn Clock>,
}

impl ServoController {
    /// Initialize the driver and park both axes at home.
    pub fn new(
        mut driver: Box<dyn ServoDriver>,
        config: &ServoConfig,
        emitter: Arc<EmitterController>,
        indicator: Arc<dyn FaultIndicator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServoError> {
        driver.init()?;
        let home = ServoPosition::home();
        for axis in Axis::ALL {
            driver.set_pulse_us(axis, angle_to_pulse_us(axis, home.get(axis)))?;
        }
        info!(
            "Servo controller ready ({}): {} steps of {} ms, fault after {} overdue ticks",
            driver.name(),
            config.steps(),
            config.step_ms,
            config.failure_threshold
        );
        Ok(Self {
            inner: Mutex::new(ServoInner {
                driver,
                config: config.clone(),
                current: home,
                target: home,
                motion: None,
                last_progress: clock.now(),
                consecutive_failures: 0,
                hardware_ok: true,
                last_failed_axis: Axis::Pan,
                stats: ServoStats {
                    hardware_ok: true,
                    ..ServoStats::default()
                },
                on_failure: None,
            }),
            emitter,
            indicator,
            clock,
        })
    }

    // ─── Commands ───────────────────────────────────────────────────

    /// Start an interpolated move. Each axis is clamped independently.
    pub fn move_to(&self, pan_deg: f32, tilt_deg: f32) -> Result<MoveOutcome, ServoError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        if !inner.hardware_ok {
            return Err(ServoError::HardwareFault(inner.last_failed_axis));
        }

        let requested = ServoPosition::new(pan_deg, tilt_deg);
        let target = requested.clamped();
        let outcome = if target == requested {
            MoveOutcome::Accepted
        } else {
            inner.stats.clamp_count += 1;
            warn!(
                "Move clamped: requested pan={:.2} tilt={:.2}, using pan={:.2} tilt={:.2}",
                pan_deg, tilt_deg, target.pan_deg, target.tilt_deg
            );
            MoveOutcome::Clamped
        };

        // A new command while still moving does not reset the watchdog window.
        if inner.motion.is_none() {
            inner.last_progress = now;
        }
        inner.target = target;
        inner.motion = Some(Motion {
            from: inner.current,
            to: target,
            steps_done: 0,
        });
        inner.stats.move_count += 1;
        Ok(outcome)
    }

    /// Move one axis, leaving the other at its current target.
    pub fn move_axis(&self, axis: Axis, deg: f32) -> Result<MoveOutcome, ServoError> {
        let mut target = self.target();
        target.set(axis, deg);
        self.move_to(target.pan_deg, target.tilt_deg)
    }

    /// Jump without interpolation.
    pub fn move_immediate(&self, pan_deg: f32, tilt_deg: f32) -> Result<MoveOutcome, ServoError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        if !inner.hardware_ok {
            return Err(ServoError::HardwareFault(inner.last_failed_axis));
        }
        let requested = ServoPosition::new(pan_deg, tilt_deg);
        let target = requested.clamped();
        let outcome = if target == requested {
            MoveOutcome::Accepted
        } else {
            inner.stats.clamp_count += 1;
            warn!(
                "Immediate move clamped to pan={:.2} tilt={:.2}",
                target.pan_deg, target.tilt_deg
            );
            MoveOutcome::Clamped
        };
        inner.write(target)?;
        inner.current = target;
        inner.target = target;
        inner.motion = None;
        inner.last_progress = now;
        inner.stats.move_count += 1;
        Ok(outcome)
    }

    /// Interpolated move to the home position.
    pub fn home(&self) -> Result<MoveOutcome, ServoError> {
        let home = ServoPosition::home();
        self.move_to(home.pan_deg, home.tilt_deg)
    }

    // ─── Periodic ───────────────────────────────────────────────────

    /// Watchdog evaluation, then one interpolation step. Returns whether a
    /// move is still in flight.
    pub fn tick(&self) -> bool {
        let now = self.clock.now();
        let tripped = {
            let mut inner = self.inner.lock();
            if !inner.hardware_ok {
                return false;
            }

            let timeout_ms = inner.config.move_time_ms * inner.config.timeout_factor;
            let check = evaluate_motion(
                inner.motion.is_some(),
                elapsed_ms(inner.last_progress, now),
                timeout_ms,
                inner.consecutive_failures,
                inner.config.failure_threshold,
            );
            inner.consecutive_failures = check.consecutive_failures;
            if check.overdue {
                warn!(
                    "Servo move overdue ({}/{} consecutive)",
                    check.consecutive_failures, inner.config.failure_threshold
                );
            }

            if check.trip {
                inner.hardware_ok = false;
                inner.stats.hardware_ok = false;
                inner.stats.watchdog_trips += 1;
                inner.motion = None;
                Some((inner.last_failed_axis, inner.on_failure.clone()))
            } else {
                inner.interpolate(now);
                None
            }
        };

        match tripped {
            Some((axis, callback)) => {
                self.handle_failure(axis, callback);
                false
            }
            None => self.is_moving(),
        }
    }

    /// One interpolation step without a watchdog evaluation. Returns whether
    /// a move is still in flight.
    pub fn step(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        if !inner.hardware_ok {
            return false;
        }
        inner.interpolate(now);
        inner.motion.is_some()
    }

    /// Period between interpolation steps.
    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.inner.lock().config.step_ms.max(1))
    }

    fn handle_failure(&self, axis: Axis, callback: Option<ServoFailureCallback>) {
        error!(
            event = "servo_failure",
            axis = axis.name(),
            "Actuator failure detected, disabling emitter"
        );
        self.emitter.deactivate();
        self.emitter.disarm();
        self.indicator.set_fault(true);
        if let Some(cb) = callback {
            cb(axis);
        }
    }

    /// Operator reset of a latched actuator fault.
    pub fn clear_fault(&self) {
        let mut inner = self.inner.lock();
        if inner.hardware_ok {
            return;
        }
        inner.hardware_ok = true;
        inner.stats.hardware_ok = true;
        inner.consecutive_failures = 0;
        inner.motion = None;
        inner.target = inner.current;
        self.indicator.set_fault(false);
        info!("Actuator fault cleared by operator");
    }

    // ─── Queries ────────────────────────────────────────────────────

    /// Last position written to the outputs (not the target).
    pub fn position(&self) -> ServoPosition {
        self.inner.lock().current
    }

    pub fn target(&self) -> ServoPosition {
        self.inner.lock().target
    }

    pub fn is_moving(&self) -> bool {
        self.inner.lock().motion.is_some()
    }

    pub fn is_hardware_ok(&self) -> bool {
        self.inner.lock().hardware_ok
    }

    pub fn stats(&self) -> ServoStats {
        self.inner.lock().stats
    }

    pub fn set_failure_callback(&self, cb: Option<ServoFailureCallback>) {
        self.inner.lock().on_failure = cb;
    }

    // ─── Startup / Shutdown ─────────────────────────────────────────

    /// Sweep each axis through its extremes and back home.
    ///
    /// Blocks the caller, polling every 10 ms for up to 20 polls per step.
    /// Only for startup, before the supervisory loop runs.
    pub fn self_test(&self) -> Result<(), ServoError> {
        let (pan_min, pan_max) = Axis::Pan.limits();
        let (tilt_min, tilt_max) = Axis::Tilt.limits();
        let home = ServoPosition::home();
        let sequence = [
            ServoPosition::new(pan_min, home.tilt_deg),
            ServoPosition::new(pan_max, home.tilt_deg),
            ServoPosition::new(Axis::Pan.center(), home.tilt_deg),
            ServoPosition::new(Axis::Pan.center(), tilt_min),
            ServoPosition::new(Axis::Pan.center(), tilt_max),
            ServoPosition::new(Axis::Pan.center(), Axis::Tilt.center()),
            home,
        ];

        info!("Servo self-test: {} positions", sequence.len());
        for (step, pos) in sequence.iter().enumerate() {
            self.move_to(pos.pan_deg, pos.tilt_deg)?;
            let mut polls = 0;
            while self.is_moving() {
                if polls >= SELF_TEST_MAX_POLLS {
                    error!("Servo self-test: step {} timed out", step);
                    return Err(ServoError::SelfTestFailed {
                        step,
                        reason: "move did not complete",
                    });
                }
                self.clock.sleep(SELF_TEST_POLL);
                self.tick();
                polls += 1;
            }
            if !self.is_hardware_ok() {
                return Err(ServoError::SelfTestFailed {
                    step,
                    reason: "actuator fault",
                });
            }
        }
        info!("Servo self-test passed");
        Ok(())
    }

    /// Park at home without interpolation and release the outputs.
    pub fn shutdown(&self) {
        let home = ServoPosition::home();
        let mut inner = self.inner.lock();
        if let Err(e) = inner.write(home) {
            warn!("Failed to park servos at home: {e}");
        } else {
            inner.current = home;
            inner.target = home;
        }
        inner.motion = None;
        if let Err(e) = inner.driver.shutdown() {
            warn!("Servo driver shutdown failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmitterConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use turret_common::clock::{ManualClock, MonotonicClock};
    use turret_common::consts::{PULSE_CENTER_US, PULSE_MAX_US};
    use turret_hal::drivers::simulation::{
        SimEmitterDriver, SimEmitterState, SimIndicator, SimServoDriver, SimServoState,
    };

    struct Rig {
        servo: ServoController,
        emitter: Arc<EmitterController>,
        clock: Arc<ManualClock>,
        outputs: Arc<SimServoState>,
        laser: Arc<SimEmitterState>,
        indicator: Arc<SimIndicator>,
    }

    fn rig() -> Rig {
        let clock = Arc::new(ManualClock::new());
        let laser_driver = SimEmitterDriver::new();
        let laser = laser_driver.state();
        let emitter = Arc::new(
            EmitterController::new(Box::new(laser_driver), &EmitterConfig::default(), clock.clone())
                .unwrap(),
        );
        let driver = SimServoDriver::new();
        let outputs = driver.state();
        let indicator = Arc::new(SimIndicator::new());
        let servo = ServoController::new(
            Box::new(driver),
            &ServoConfig::default(),
            emitter.clone(),
            indicator.clone(),
            clock.clone(),
        )
        .unwrap();
        Rig {
            servo,
            emitter,
            clock,
            outputs,
            laser,
            indicator,
        }
    }

    #[test]
    fn starts_at_home() {
        let r = rig();
        assert_eq!(r.servo.position(), ServoPosition::home());
        assert_eq!(r.outputs.pulse_us(Axis::Tilt), PULSE_CENTER_US);
        assert!(!r.servo.is_moving());
    }

    /// Run enough ticks to finish any move.
    fn settle(r: &Rig) {
        for _ in 0..=ServoConfig::default().steps() {
            r.servo.tick();
        }
    }

    #[test]
    fn move_is_interpolated_not_instant() {
        let r = rig();
        r.servo.move_to(18.0, -6.0).unwrap();
        assert_eq!(r.servo.position(), ServoPosition::home());
        assert!(r.servo.is_moving());

        // 45 ms in 5 ms steps: 9 steps of 2° pan, 1° tilt.
        assert!(r.servo.tick());
        let first = r.servo.position();
        assert!((first.pan_deg - 2.0).abs() < 1e-4);
        assert!((first.tilt_deg + 14.0).abs() < 1e-4);

        for _ in 0..7 {
            assert!(r.servo.step());
        }
        assert!(!r.servo.step());
        assert_eq!(r.servo.position(), ServoPosition::new(18.0, -6.0));
        assert!(!r.servo.is_moving());
    }

    #[test]
    fn every_step_reaches_the_outputs() {
        let r = rig();
        let before = r.outputs.writes();
        r.servo.move_to(-30.0, -25.0).unwrap();
        // A long gap between calls still yields one step per call.
        r.clock.advance_ms(100);
        r.servo.tick();
        assert!(r.servo.is_moving());
        settle(&r);
        assert_eq!(r.servo.position(), ServoPosition::new(-30.0, -25.0));
        let steps = u64::from(ServoConfig::default().steps());
        assert_eq!(r.outputs.writes() - before, steps * 2);
    }

    #[test]
    fn step_interval_follows_config() {
        let r = rig();
        assert_eq!(r.servo.step_interval(), Duration::from_millis(5));
    }

    #[test]
    fn upward_tilt_is_clamped_to_horizontal() {
        let r = rig();
        for tilt in [0.5, 10.0, 90.0, f32::INFINITY] {
            assert_eq!(r.servo.move_to(0.0, tilt).unwrap(), MoveOutcome::Clamped);
            assert_eq!(r.servo.target().tilt_deg, 0.0);
        }
        settle(&r);
        assert!(r.servo.position().tilt_deg <= 0.0);
        assert_eq!(r.outputs.pulse_us(Axis::Tilt), PULSE_MAX_US);
        assert_eq!(r.servo.stats().clamp_count, 4);
    }

    #[test]
    fn in_range_move_not_counted_as_clamp() {
        let r = rig();
        assert_eq!(r.servo.move_to(10.0, -5.0).unwrap(), MoveOutcome::Accepted);
        assert_eq!(r.servo.stats().clamp_count, 0);
    }

    #[test]
    fn move_axis_keeps_other_axis() {
        let r = rig();
        r.servo.move_axis(Axis::Pan, 15.0).unwrap();
        assert_eq!(r.servo.target(), ServoPosition::new(15.0, -15.0));
    }

    #[test]
    fn move_immediate_skips_interpolation() {
        let r = rig();
        r.servo.move_immediate(-10.0, -20.0).unwrap();
        assert_eq!(r.servo.position(), ServoPosition::new(-10.0, -20.0));
        assert!(!r.servo.is_moving());
    }

    #[test]
    fn home_returns_to_home() {
        let r = rig();
        r.servo.move_immediate(30.0, -2.0).unwrap();
        r.servo.home().unwrap();
        settle(&r);
        assert_eq!(r.servo.position(), ServoPosition::home());
    }

    #[test]
    fn healthy_moves_never_trip_watchdog() {
        let r = rig();
        for i in 0..20 {
            r.servo.move_to(i as f32, -10.0).unwrap();
            r.clock.advance_ms(100);
            r.servo.tick();
        }
        assert!(r.servo.is_hardware_ok());
    }

    #[test]
    fn stuck_motion_trips_after_consecutive_overdue_ticks() {
        let r = rig();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        r.servo.set_failure_callback(Some(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })));
        r.emitter.arm().unwrap();
        r.emitter.activate().unwrap();

        r.outputs.set_failing(true);
        r.servo.move_to(20.0, -10.0).unwrap();
        for _ in 0..3 {
            r.clock.advance_ms(100);
            r.servo.tick();
            assert!(r.servo.is_hardware_ok());
        }
        r.clock.advance_ms(100);
        r.servo.tick();
        assert!(!r.servo.is_hardware_ok());
        assert!(!r.laser.is_on());
        assert!(!r.emitter.is_armed());
        assert!(r.indicator.is_fault());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Latched: further ticks do not re-fire, commands are refused.
        for _ in 0..5 {
            r.clock.advance_ms(100);
            r.servo.tick();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(r.servo.stats().watchdog_trips, 1);
        assert!(matches!(r.servo.move_to(0.0, -10.0), Err(ServoError::HardwareFault(_))));
    }

    #[test]
    fn repeated_commands_do_not_mask_a_stuck_actuator() {
        let r = rig();
        r.outputs.set_failing(true);
        for i in 0..10 {
            let _ = r.servo.move_to(i as f32, -10.0);
            r.clock.advance_ms(100);
            r.servo.tick();
        }
        assert!(!r.servo.is_hardware_ok());
    }

    #[test]
    fn clear_fault_starts_new_episode() {
        let r = rig();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        r.servo.set_failure_callback(Some(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })));
        r.outputs.set_failing(true);
        r.servo.move_to(20.0, -10.0).unwrap();
        for _ in 0..4 {
            r.clock.advance_ms(100);
            r.servo.tick();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        r.outputs.set_failing(false);
        r.servo.clear_fault();
        assert!(r.servo.is_hardware_ok());
        assert!(!r.indicator.is_fault());
        r.servo.move_to(5.0, -5.0).unwrap();
        settle(&r);
        assert_eq!(r.servo.position(), ServoPosition::new(5.0, -5.0));

        r.outputs.set_failing(true);
        r.servo.move_to(20.0, -10.0).unwrap();
        for _ in 0..4 {
            r.clock.advance_ms(100);
            r.servo.tick();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn self_test_passes_on_healthy_hardware() {
        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        let emitter = Arc::new(
            EmitterController::new(
                Box::new(SimEmitterDriver::new()),
                &EmitterConfig::default(),
                clock.clone(),
            )
            .unwrap(),
        );
        let servo = ServoController::new(
            Box::new(SimServoDriver::new()),
            &ServoConfig::default(),
            emitter,
            Arc::new(SimIndicator::new()),
            clock,
        )
        .unwrap();
        servo.self_test().unwrap();
        assert_eq!(servo.position(), ServoPosition::home());
    }

    #[test]
    fn self_test_fails_when_outputs_dead() {
        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        let emitter = Arc::new(
            EmitterController::new(
                Box::new(SimEmitterDriver::new()),
                &EmitterConfig::default(),
                clock.clone(),
            )
            .unwrap(),
        );
        let driver = SimServoDriver::new();
        let outputs = driver.state();
        let servo = ServoController::new(
            Box::new(driver),
            &ServoConfig::default(),
            emitter,
            Arc::new(SimIndicator::new()),
            clock,
        )
        .unwrap();
        outputs.set_failing(true);
        assert!(matches!(
            servo.self_test(),
            Err(ServoError::SelfTestFailed { step: 0, .. })
        ));
    }
}
