//! Safety enforcement layer.
//!
//! The only path to `EmitterController::activate`. Every attempt evaluates
//! five checks against live state and fails closed:
//!
//! 1. armed (arm input)
//! 2. a target is being tracked
//! 3. actual tilt at or below the upward limit
//! 4. continuous on-time below the limit
//! 5. kill switch clear
//!
//! Independently, `update()` runs the heartbeat watchdog, the brownout
//! monitor and an early auto-off. Watchdog timeout, brownout and emergency
//! stop enter safe mode, which latches until `reset()`.
//!
//! # Lock order
//!
//! safety → emitter, safety → servo. The arm input is read before the
//! safety lock is taken. Emitter commands issued under the safety lock use
//! the deferred variants, so emitter callbacks fire together with this
//! layer's own callbacks after the lock is released.

pub mod arm;
pub mod checks;
pub mod level;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use static_assertions::const_assert_eq;
use tracing::{debug, error, info, warn};
use turret_common::clock::Clock;
use turret_common::consts::{AUTO_OFF_MARGIN_MS, EMITTER_MAX_ON_MS, NOMINAL_VOLTAGE_MV, TILT_MAX_DEG};

use crate::config::SafetyConfig;
use crate::emitter::{EmitterController, EmitterError, EmitterEvents};
use crate::servo::ServoController;

pub use arm::{ArmInput, SharedArmInput};
pub use checks::{SafeModeCause, SafetyCheck, SafetySnapshot, Verdict};
pub use level::{LevelEvent, LevelMachine, LevelTransition, SafetyLevel};

/// Continuous on-time ceiling judged by this layer [ms].
const MAX_CONTINUOUS_MS: u64 = 10_000;
const_assert_eq!(MAX_CONTINUOUS_MS, EMITTER_MAX_ON_MS);

/// Why an activation request did not switch the emitter on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    SafeMode(SafeModeCause),
    Check(SafetyCheck),
    Multiple(SafetyCheck),
    /// Checks passed but the emitter refused (cooldown, not armed yet).
    Emitter(EmitterError),
}

/// Result of [`SafetyLayer::request_activation`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActivationOutcome {
    Activated(SafetySnapshot),
    Refused(Refusal, SafetySnapshot),
}

impl ActivationOutcome {
    #[inline]
    pub fn is_activated(&self) -> bool {
        matches!(self, ActivationOutcome::Activated(_))
    }

    pub fn snapshot(&self) -> &SafetySnapshot {
        match self {
            ActivationOutcome::Activated(s) | ActivationOutcome::Refused(_, s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SafetyStats {
    pub activation_requests: u32,
    pub activations: u32,
    pub refusals: u32,
    /// Failures per check, indexed like `SafetyCheck::NAMES`.
    pub check_failures: [u32; 5],
    pub safe_mode_entries: u32,
    pub watchdog_warnings: u32,
    pub auto_offs: u32,
}

pub type SafetyLevelCallback = Arc<dyn Fn(SafetyLevel, SafetyLevel) + Send + Sync>;
pub type SafetyFailureCallback = Arc<dyn Fn(&SafetySnapshot) + Send + Sync>;
/// Called with the time left before the watchdog forces safe mode.
pub type WatchdogWarningCallback = Arc<dyn Fn(Duration) + Send + Sync>;

struct SafetyInner {
    config: SafetyConfig,
    machine: LevelMachine,
    cause: SafeModeCause,
    detection_active: bool,
    last_feed: Duration,
    watchdog_warned: bool,
    voltage_mv: u32,
    voltage_warned: bool,
    arm_input_level: bool,
    activation_deadline: Option<Duration>,
    last_snapshot: SafetySnapshot,
    stats: SafetyStats,
    on_level: Option<SafetyLevelCallback>,
    on_failure: Option<SafetyFailureCallback>,
    on_watchdog_warning: Option<WatchdogWarningCallback>,
}

#[derive(Default)]
struct Pending {
    emitter: EmitterEvents,
    level: Option<(SafetyLevel, SafetyLevel, SafetyLevelCallback)>,
    failure: Option<(SafetySnapshot, SafetyFailureCallback)>,
    watchdog_warning: Option<(Duration, WatchdogWarningCallback)>,
}

impl Pending {
    fn fire(self) {
        self.emitter.fire();
        if let Some((old, new, cb)) = self.level {
            cb(old, new);
        }
        if let Some((snap, cb)) = self.failure {
            cb(&snap);
        }
        if let Some((remaining, cb)) = self.watchdog_warning {
            cb(remaining);
        }
    }
}

impl SafetyInner {
    fn apply(&mut self, event: LevelEvent, pending: &mut Pending) {
        let old = self.machine.level();
        if let LevelTransition::Ok(new) = self.machine.handle_event(event) {
            if new != old {
                info!("Safety level: {} -> {}", old.name(), new.name());
                if let Some(cb) = &self.on_level {
                    let first_old = pending.level.as_ref().map_or(old, |(o, _, _)| *o);
                    pending.level = Some((first_old, new, Arc::clone(cb)));
                }
            }
        }
    }

    fn watchdog_remaining(&self, now: Duration) -> Duration {
        let timeout = Duration::from_millis(self.config.watchdog_timeout_ms);
        timeout.saturating_sub(now.saturating_sub(self.last_feed))
    }

    #[inline]
    fn is_safe_mode(&self) -> bool {
        self.machine.level().is_latched()
    }
}

/// Mandatory choke point for emitter activation.
pub struct SafetyLayer {
    inner: Mutex<SafetyInner>,
    emitter: Arc<EmitterController>,
    servo: Arc<ServoController>,
    arm: Arc<dyn ArmInput>,
    clock: Arc<dyn Clock>,
}

impl SafetyLayer {
    pub fn new(
        config: &SafetyConfig,
        emitter: Arc<EmitterController>,
        servo: Arc<ServoController>,
        arm: Arc<dyn ArmInput>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!(
            "Safety layer ready: watchdog {} ms (warn {} ms), brownout {} mV",
            config.watchdog_timeout_ms, config.watchdog_warning_ms, config.brownout_mv
        );
        let now = clock.now();
        Self {
            inner: Mutex::new(SafetyInner {
                config: config.clone(),
                machine: LevelMachine::new(),
                cause: SafeModeCause::None,
                detection_active: false,
                last_feed: now,
                watchdog_warned: false,
                voltage_mv: NOMINAL_VOLTAGE_MV,
                voltage_warned: false,
                arm_input_level: false,
                activation_deadline: None,
                last_snapshot: SafetySnapshot::default(),
                stats: SafetyStats::default(),
                on_level: None,
                on_failure: None,
                on_watchdog_warning: None,
            }),
            emitter,
            servo,
            arm,
            clock,
        }
    }

    // ─── Activation ─────────────────────────────────────────────────

    /// Run all checks and, if they pass, switch the emitter on.
    ///
    /// Never returns an error: refusals are logged and described by the
    /// returned outcome and by [`SafetyLayer::snapshot`].
    pub fn request_activation(&self) -> ActivationOutcome {
        self.request(None)
    }

    /// As [`request_activation`](Self::request_activation), switching off
    /// again after `duration` (capped at the maximum on-time).
    pub fn request_activation_for(&self, duration: Duration) -> ActivationOutcome {
        self.request(Some(duration))
    }

    fn request(&self, duration: Option<Duration>) -> ActivationOutcome {
        let armed = self.arm.is_armed();
        let estop = self.arm.is_emergency_stop();
        let now = self.clock.now();
        let mut pending = Pending::default();

        let outcome = {
            let mut inner = self.inner.lock();
            inner.stats.activation_requests += 1;

            if estop {
                self.enter_safe_mode_locked(&mut inner, SafeModeCause::ManualEStop, &mut pending);
            }

            let snapshot = self.evaluate_locked(&inner, armed, now);
            inner.last_snapshot = snapshot;

            let refusal = match snapshot.verdict() {
                Verdict::Pass => match self.emitter.activate_deferred(&mut pending.emitter) {
                    Ok(()) => None,
                    Err(e) => Some(Refusal::Emitter(e)),
                },
                Verdict::SafeMode(cause) => Some(Refusal::SafeMode(cause)),
                Verdict::Failed(check) => Some(Refusal::Check(check)),
                Verdict::Multiple(checks) => Some(Refusal::Multiple(checks)),
            };

            match refusal {
                None => {
                    inner.stats.activations += 1;
                    let cap = self.emitter.max_on_time();
                    inner.activation_deadline = duration.map(|d| now + d.min(cap));
                    debug!("Activation granted");
                    ActivationOutcome::Activated(snapshot)
                }
                Some(refusal) => {
                    inner.stats.refusals += 1;
                    for (flag, _) in SafetyCheck::NAMES {
                        if snapshot.failed.contains(flag) {
                            if let Some(i) = flag.index() {
                                inner.stats.check_failures[i] += 1;
                            }
                        }
                    }
                    warn!(
                        event = "activation_refused",
                        failed = %snapshot.failed,
                        safe_mode = snapshot.safe_mode,
                        cause = snapshot.cause.name(),
                        "Emitter activation refused: {:?}",
                        refusal
                    );
                    if let Some(cb) = &inner.on_failure {
                        pending.failure = Some((snapshot, Arc::clone(cb)));
                    }
                    ActivationOutcome::Refused(refusal, snapshot)
                }
            }
        };

        pending.fire();
        outcome
    }

    fn evaluate_locked(&self, inner: &SafetyInner, armed: bool, now: Duration) -> SafetySnapshot {
        let mut failed = SafetyCheck::empty();

        if !armed {
            failed |= SafetyCheck::ARMED;
        }
        if !inner.detection_active {
            failed |= SafetyCheck::DETECTION;
        }

        // Physical position, not the commanded target.
        let tilt_deg = self.servo.position().tilt_deg;
        if tilt_deg.is_nan() || tilt_deg > TILT_MAX_DEG {
            failed |= SafetyCheck::TILT;
        }

        let continuous_on = self.emitter.current_on_time();
        let limit = self
            .emitter
            .max_on_time()
            .min(Duration::from_millis(MAX_CONTINUOUS_MS));
        if continuous_on >= limit {
            failed |= SafetyCheck::CONTINUOUS_TIME;
        }

        if self.emitter.is_kill_switch_engaged() {
            failed |= SafetyCheck::KILL_SWITCH;
        }

        SafetySnapshot {
            failed,
            safe_mode: inner.is_safe_mode(),
            cause: inner.cause,
            tilt_deg,
            continuous_on,
            watchdog_remaining: inner.watchdog_remaining(now),
            voltage_mv: inner.voltage_mv,
            at: now,
        }
    }

    /// Switch the emitter off. Always allowed.
    pub fn deactivate(&self) {
        let mut pending = Pending::default();
        {
            let mut inner = self.inner.lock();
            inner.activation_deadline = None;
            self.emitter.deactivate_deferred(&mut pending.emitter);
        }
        pending.fire();
    }

    /// Run the checks without activating. Updates the stored snapshot.
    pub fn check_all(&self) -> SafetySnapshot {
        let armed = self.arm.is_armed();
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let snapshot = self.evaluate_locked(&inner, armed, now);
        inner.last_snapshot = snapshot;
        snapshot
    }

    // ─── Inputs ─────────────────────────────────────────────────────

    /// Targeting reports whether a target is being tracked.
    pub fn set_detection_active(&self, active: bool) {
        let mut inner = self.inner.lock();
        if inner.detection_active != active {
            debug!("Detection active: {}", active);
            inner.detection_active = active;
        }
    }

    /// Positive heartbeat.
    pub fn feed_watchdog(&self) {
        let now = self.clock.now();
        let mut pending = Pending::default();
        {
            let mut inner = self.inner.lock();
            inner.last_feed = now;
            if inner.watchdog_warned {
                inner.watchdog_warned = false;
                if !inner.voltage_warned {
                    inner.apply(LevelEvent::AllOk, &mut pending);
                }
            }
        }
        pending.fire();
    }

    /// Latest supply voltage reading. Brownout is acted on immediately.
    pub fn set_voltage(&self, millivolts: u32) {
        let mut pending = Pending::default();
        {
            let mut inner = self.inner.lock();
            inner.voltage_mv = millivolts;
            self.evaluate_voltage_locked(&mut inner, &mut pending);
        }
        pending.fire();
    }

    /// Emergency stop from the arm input or an operator command.
    pub fn emergency_stop(&self) {
        let mut pending = Pending::default();
        {
            let mut inner = self.inner.lock();
            self.enter_safe_mode_locked(&mut inner, SafeModeCause::ManualEStop, &mut pending);
        }
        pending.fire();
    }

    // ─── Periodic ───────────────────────────────────────────────────

    /// Arm synchronisation, emergency stop, watchdog, brownout and auto-off.
    pub fn update(&self) {
        let armed = self.arm.is_armed();
        let estop = self.arm.is_emergency_stop();
        let now = self.clock.now();
        let mut pending = Pending::default();
        {
            let mut inner = self.inner.lock();

            // Arm follows the input's rising edge only, so a reset never re-arms.
            let rising = armed && !inner.arm_input_level;
            inner.arm_input_level = armed;
            if !armed {
                if self.emitter.is_armed() {
                    self.emitter.disarm_deferred(&mut pending.emitter);
                }
            } else if rising && !inner.is_safe_mode() {
                if let Err(e) = self.emitter.arm_deferred(&mut pending.emitter) {
                    warn!("Arm request not applied: {e}");
                }
            }

            if estop {
                self.enter_safe_mode_locked(&mut inner, SafeModeCause::ManualEStop, &mut pending);
            }

            self.evaluate_watchdog_locked(&mut inner, now, &mut pending);
            self.evaluate_voltage_locked(&mut inner, &mut pending);

            let on = self.emitter.current_on_time();
            let auto_off = self
                .emitter
                .max_on_time()
                .saturating_sub(Duration::from_millis(AUTO_OFF_MARGIN_MS));
            if self.emitter.is_active() && on >= auto_off {
                warn!(
                    event = "safety_timeout",
                    on_time_ms = on.as_millis() as u64,
                    "Continuous on-time near limit, switching emitter off"
                );
                inner.stats.auto_offs += 1;
                inner.activation_deadline = None;
                self.emitter.deactivate_deferred(&mut pending.emitter);
            }

            if inner.activation_deadline.is_some_and(|t| now >= t) {
                debug!("Timed activation elapsed");
                inner.activation_deadline = None;
                self.emitter.deactivate_deferred(&mut pending.emitter);
            }
        }
        pending.fire();
    }

    fn evaluate_watchdog_locked(&self, inner: &mut SafetyInner, now: Duration, pending: &mut Pending) {
        if inner.is_safe_mode() {
            return;
        }
        let since_ms = now.saturating_sub(inner.last_feed).as_millis() as u64;
        if since_ms >= inner.config.watchdog_timeout_ms {
            error!(
                event = "watchdog_timeout",
                since_feed_ms = since_ms,
                "No heartbeat within watchdog timeout"
            );
            self.enter_safe_mode_locked(inner, SafeModeCause::Watchdog, pending);
        } else if since_ms >= inner.config.watchdog_warning_ms && !inner.watchdog_warned {
            inner.watchdog_warned = true;
            inner.stats.watchdog_warnings += 1;
            let remaining = inner.watchdog_remaining(now);
            warn!(
                event = "watchdog_warning",
                remaining_ms = remaining.as_millis() as u64,
                "Heartbeat overdue"
            );
            inner.apply(LevelEvent::Warning, pending);
            if let Some(cb) = &inner.on_watchdog_warning {
                pending.watchdog_warning = Some((remaining, Arc::clone(cb)));
            }
        }
    }

    fn evaluate_voltage_locked(&self, inner: &mut SafetyInner, pending: &mut Pending) {
        let mv = inner.voltage_mv;
        if mv > 0 && mv < inner.config.brownout_mv {
            if !inner.is_safe_mode() {
                error!(
                    event = "brownout",
                    voltage_mv = mv,
                    threshold_mv = inner.config.brownout_mv,
                    "Supply voltage below brownout threshold"
                );
                self.enter_safe_mode_locked(inner, SafeModeCause::Brownout, pending);
            }
        } else if mv > 0 && mv < inner.config.voltage_warning_mv {
            if !inner.voltage_warned {
                inner.voltage_warned = true;
                warn!(event = "voltage_warning", voltage_mv = mv, "Supply voltage low");
                inner.apply(LevelEvent::Warning, pending);
            }
        } else if inner.voltage_warned {
            inner.voltage_warned = false;
            if !inner.watchdog_warned {
                inner.apply(LevelEvent::AllOk, pending);
            }
        }
    }

    fn enter_safe_mode_locked(&self, inner: &mut SafetyInner, cause: SafeModeCause, pending: &mut Pending) {
        if inner.is_safe_mode() {
            return;
        }
        error!(event = "safe_mode", cause = cause.name(), "Entering safe mode");
        let event = match cause {
            SafeModeCause::ManualEStop => LevelEvent::Emergency,
            _ => LevelEvent::SafeMode,
        };
        inner.apply(event, pending);
        inner.cause = cause;
        inner.activation_deadline = None;
        inner.stats.safe_mode_entries += 1;
        self.emitter.deactivate_deferred(&mut pending.emitter);
        self.emitter.inhibit_deferred(&mut pending.emitter);
    }

    // ─── Reset ──────────────────────────────────────────────────────

    /// Leave safe mode. Restarts the watchdog window and releases the
    /// safe-mode inhibit; an operator kill switch stays engaged and the
    /// emitter stays disarmed until the arm input is cycled. Returns false
    /// if not in safe mode.
    pub fn reset(&self) -> bool {
        let now = self.clock.now();
        let mut pending = Pending::default();
        {
            let mut inner = self.inner.lock();
            if !inner.is_safe_mode() {
                debug!("Reset ignored: not in safe mode");
                return false;
            }
            info!(
                event = "safety_reset",
                cause = inner.cause.name(),
                "Safe mode cleared by operator, emitter remains disarmed"
            );
            inner.apply(LevelEvent::Reset, &mut pending);
            inner.cause = SafeModeCause::None;
            inner.last_feed = now;
            inner.watchdog_warned = false;
            inner.voltage_warned = false;
            self.emitter.release_inhibit_deferred(&mut pending.emitter);
        }
        self.arm.clear_emergency();
        pending.fire();
        true
    }

    // ─── Queries ────────────────────────────────────────────────────

    pub fn level(&self) -> SafetyLevel {
        self.inner.lock().machine.level()
    }

    pub fn is_safe_mode(&self) -> bool {
        self.inner.lock().is_safe_mode()
    }

    pub fn safe_mode_cause(&self) -> SafeModeCause {
        self.inner.lock().cause
    }

    /// Snapshot from the most recent evaluation.
    pub fn snapshot(&self) -> SafetySnapshot {
        self.inner.lock().last_snapshot
    }

    pub fn watchdog_remaining(&self) -> Duration {
        let now = self.clock.now();
        self.inner.lock().watchdog_remaining(now)
    }

    pub fn voltage_mv(&self) -> u32 {
        self.inner.lock().voltage_mv
    }

    pub fn stats(&self) -> SafetyStats {
        self.inner.lock().stats
    }

    // ─── Callbacks ──────────────────────────────────────────────────

    pub fn set_level_callback(&self, cb: Option<SafetyLevelCallback>) {
        self.inner.lock().on_level = cb;
    }

    pub fn set_failure_callback(&self, cb: Option<SafetyFailureCallback>) {
        self.inner.lock().on_failure = cb;
    }

    pub fn set_watchdog_warning_callback(&self, cb: Option<WatchdogWarningCallback>) {
        self.inner.lock().on_watchdog_warning = cb;
    }
}
