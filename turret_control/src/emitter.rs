//! Emitter controller: on/off state machine with timing limits and kill switch.
//!
//! ```text
//! Off ──arm──▶ Armed ──activate──▶ Active ──deactivate / max-on──▶ Cooldown
//!  ▲                                                                 │
//!  └───────────────────── cooldown elapsed (Armed if still armed) ◀──┘
//!
//! any ──kill_switch──▶ EmergencyStop ──reset_kill_switch──▶ Off (disarmed)
//! any ──inhibit──────▶ EmergencyStop ──release_inhibit────▶ Off (disarmed)
//! ```
//!
//! `arm()` and `activate()` are crate-private: outside the crate the emitter
//! can only be observed or switched off, and switching on goes through
//! `SafetyLayer`. The operator kill switch and the safe-mode inhibit are
//! separate latches, so releasing one never releases the other.
//!
//! The `*_deferred` variants queue their notifications into
//! [`EmitterEvents`] instead of firing them, for callers that hold their own
//! lock and fire once it is released.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use turret_common::clock::Clock;
use turret_common::hal::driver::{EmitterDriver, HalError};

use crate::config::EmitterConfig;

/// Emitter lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmitterState {
    /// Output off, not armed.
    Off,
    /// Output off, ready to activate.
    Armed,
    /// Output on.
    Active,
    /// Output off, re-activation blocked until the cooldown elapses.
    Cooldown,
    /// Output off, kill switch latched.
    EmergencyStop,
}

impl EmitterState {
    pub const fn name(self) -> &'static str {
        match self {
            EmitterState::Off => "OFF",
            EmitterState::Armed => "ARMED",
            EmitterState::Active => "ACTIVE",
            EmitterState::Cooldown => "COOLDOWN",
            EmitterState::EmergencyStop => "EMERGENCY_STOP",
        }
    }
}

/// Operational refusals returned by [`EmitterController::activate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitterError {
    #[error("emitter not armed")]
    NotArmed,

    #[error("kill switch active")]
    KillSwitchActive,

    #[error("emitter inhibited by safe mode")]
    Inhibited,

    #[error("emitter in cooldown ({remaining_ms} ms remaining)")]
    InCooldown { remaining_ms: u64 },

    #[error("emitter output: {0}")]
    Driver(#[from] HalError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitterStats {
    pub activation_count: u32,
    pub safety_timeout_count: u32,
    pub cooldown_block_count: u32,
    pub kill_switch_count: u32,
    /// Completed on-time, excluding a session in progress.
    pub total_on_time: Duration,
}

/// Called with `(old, new)` after every state change.
pub type EmitterStateCallback = Arc<dyn Fn(EmitterState, EmitterState) + Send + Sync>;
/// Called with the on-time of a session cut off by the max-on limit.
pub type EmitterTimeoutCallback = Arc<dyn Fn(Duration) + Send + Sync>;

struct EmitterInner {
    driver: Box<dyn EmitterDriver>,
    max_on: Duration,
    cooldown: Duration,
    state: EmitterState,
    armed: bool,
    kill_switch: bool,
    inhibited: bool,
    on_since: Option<Duration>,
    cooldown_until: Option<Duration>,
    stats: EmitterStats,
    on_state_change: Option<EmitterStateCallback>,
    on_timeout: Option<EmitterTimeoutCallback>,
}

/// Notifications collected under a lock, fired after it is released.
#[derive(Default)]
pub(crate) struct EmitterEvents {
    state_change: Option<(EmitterState, EmitterState, EmitterStateCallback)>,
    timeout: Option<(Duration, EmitterTimeoutCallback)>,
}

impl EmitterEvents {
    pub(crate) fn fire(self) {
        if let Some((old, new, cb)) = self.state_change {
            cb(old, new);
        }
        if let Some((on_time, cb)) = self.timeout {
            cb(on_time);
        }
    }
}

impl EmitterInner {
    fn set_state(&mut self, new: EmitterState, pending: &mut EmitterEvents) {
        let old = self.state;
        if old == new {
            return;
        }
        self.state = new;
        debug!("Emitter state: {} -> {}", old.name(), new.name());
        if let Some(cb) = &self.on_state_change {
            // Keep the first old state if several transitions happen in one call.
            let first_old = pending.state_change.as_ref().map_or(old, |(o, _, _)| *o);
            pending.state_change = Some((first_old, new, Arc::clone(cb)));
        }
    }

    fn on_time(&self, now: Duration) -> Duration {
        self.on_since.map_or(Duration::ZERO, |t| now.saturating_sub(t))
    }

    fn cooldown_remaining(&self, now: Duration) -> Duration {
        self.cooldown_until
            .map_or(Duration::ZERO, |t| t.saturating_sub(now))
    }

    fn drive_off(&mut self) {
        if let Err(e) = self.driver.set_output(false) {
            error!("Emitter output failed to switch off: {e}");
        }
    }

    /// Output off; starts cooldown if a session was running. Returns the
    /// session's on-time.
    fn switch_off(&mut self, now: Duration, pending: &mut EmitterEvents) -> Option<Duration> {
        self.drive_off();
        let on_since = self.on_since.take()?;
        let on_time = now.saturating_sub(on_since);
        self.stats.total_on_time += on_time;
        self.cooldown_until = Some(now + self.cooldown);
        let next = if self.is_latched() {
            EmitterState::EmergencyStop
        } else {
            EmitterState::Cooldown
        };
        self.set_state(next, pending);
        Some(on_time)
    }

    #[inline]
    fn is_latched(&self) -> bool {
        self.kill_switch || self.inhibited
    }

    fn resting_state(&self) -> EmitterState {
        if self.is_latched() {
            EmitterState::EmergencyStop
        } else if self.cooldown_until.is_some() {
            EmitterState::Cooldown
        } else if self.armed {
            EmitterState::Armed
        } else {
            EmitterState::Off
        }
    }
}

/// Thread-safe emitter controller.
pub struct EmitterController {
    inner: Mutex<EmitterInner>,
    clock: Arc<dyn Clock>,
}

impl EmitterController {
    /// Initialize the output (forced low) and start Off, disarmed.
    pub fn new(
        mut driver: Box<dyn EmitterDriver>,
        config: &EmitterConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EmitterError> {
        driver.init()?;
        driver.set_output(false)?;
        info!(
            "Emitter controller ready ({}): max on {} ms, cooldown {} ms",
            driver.name(),
            config.max_on_ms,
            config.cooldown_ms
        );
        Ok(Self {
            inner: Mutex::new(EmitterInner {
                driver,
                max_on: Duration::from_millis(config.max_on_ms),
                cooldown: Duration::from_millis(config.cooldown_ms),
                state: EmitterState::Off,
                armed: false,
                kill_switch: false,
                inhibited: false,
                on_since: None,
                cooldown_until: None,
                stats: EmitterStats::default(),
                on_state_change: None,
                on_timeout: None,
            }),
            clock,
        })
    }

    // ─── Arming ─────────────────────────────────────────────────────

    /// Arm. Refused while the kill switch or the inhibit is latched.
    pub(crate) fn arm(&self) -> Result<(), EmitterError> {
        let mut pending = EmitterEvents::default();
        let result = self.arm_deferred(&mut pending);
        pending.fire();
        result
    }

    pub(crate) fn arm_deferred(&self, pending: &mut EmitterEvents) -> Result<(), EmitterError> {
        let mut inner = self.inner.lock();
        if inner.kill_switch {
            warn!("Arm refused: kill switch active");
            return Err(EmitterError::KillSwitchActive);
        }
        if inner.inhibited {
            warn!("Arm refused: safe mode inhibit active");
            return Err(EmitterError::Inhibited);
        }
        if !inner.armed {
            inner.armed = true;
            info!("Emitter ARMED");
        }
        let next = inner.resting_state();
        if inner.state != EmitterState::Active {
            inner.set_state(next, pending);
        }
        Ok(())
    }

    /// Disarm. Switches the output off if it was on.
    pub fn disarm(&self) {
        let mut pending = EmitterEvents::default();
        self.disarm_deferred(&mut pending);
        pending.fire();
    }

    pub(crate) fn disarm_deferred(&self, pending: &mut EmitterEvents) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let was_armed = inner.armed;
        inner.armed = false;
        inner.switch_off(now, pending);
        let next = inner.resting_state();
        inner.set_state(next, pending);
        if was_armed {
            info!("Emitter DISARMED");
        }
    }

    // ─── On / Off ───────────────────────────────────────────────────

    /// Switch the output on.
    ///
    /// Checked in order: kill switch, inhibit, armed, cooldown. Activating
    /// while already on is a no-op.
    pub(crate) fn activate(&self) -> Result<(), EmitterError> {
        let mut pending = EmitterEvents::default();
        let result = self.activate_deferred(&mut pending);
        pending.fire();
        result
    }

    pub(crate) fn activate_deferred(&self, pending: &mut EmitterEvents) -> Result<(), EmitterError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        if inner.kill_switch {
            warn!("Emitter activation refused: kill switch active");
            return Err(EmitterError::KillSwitchActive);
        }
        if inner.inhibited {
            warn!("Emitter activation refused: safe mode inhibit active");
            return Err(EmitterError::Inhibited);
        }
        if !inner.armed {
            warn!("Emitter activation refused: not armed");
            return Err(EmitterError::NotArmed);
        }
        let remaining = inner.cooldown_remaining(now);
        if !remaining.is_zero() {
            inner.stats.cooldown_block_count += 1;
            let remaining_ms = remaining.as_millis() as u64;
            debug!("Emitter activation refused: cooldown {} ms remaining", remaining_ms);
            return Err(EmitterError::InCooldown { remaining_ms });
        }
        if inner.state == EmitterState::Active {
            return Ok(());
        }

        if let Err(e) = inner.driver.set_output(true) {
            error!("Emitter output failed to switch on: {e}");
            inner.drive_off();
            return Err(e.into());
        }
        inner.cooldown_until = None;
        inner.on_since = Some(now);
        inner.stats.activation_count += 1;
        inner.set_state(EmitterState::Active, pending);
        info!("Emitter ON (activation #{})", inner.stats.activation_count);
        Ok(())
    }

    /// Switch the output off. Always allowed, idempotent.
    pub fn deactivate(&self) {
        let mut pending = EmitterEvents::default();
        self.deactivate_deferred(&mut pending);
        pending.fire();
    }

    pub(crate) fn deactivate_deferred(&self, pending: &mut EmitterEvents) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        if let Some(on_time) = inner.switch_off(now, pending) {
            info!("Emitter OFF after {} ms", on_time.as_millis());
        }
    }

    // ─── Kill Switch ────────────────────────────────────────────────

    /// Output off, disarm and latch until `reset_kill_switch()`.
    pub fn kill_switch(&self) {
        let now = self.clock.now();
        let mut pending = EmitterEvents::default();
        {
            let mut inner = self.inner.lock();
            inner.kill_switch = true;
            inner.armed = false;
            inner.switch_off(now, &mut pending);
            inner.set_state(EmitterState::EmergencyStop, &mut pending);
            inner.stats.kill_switch_count += 1;
            error!(
                event = "kill_switch",
                count = inner.stats.kill_switch_count,
                "Kill switch engaged, emitter disabled"
            );
        }
        pending.fire();
    }

    /// Release the kill switch. The emitter stays disarmed.
    pub fn reset_kill_switch(&self) {
        let mut pending = EmitterEvents::default();
        {
            let mut inner = self.inner.lock();
            if !inner.kill_switch {
                return;
            }
            inner.kill_switch = false;
            inner.armed = false;
            let next = inner.resting_state();
            inner.set_state(next, &mut pending);
            info!("Kill switch reset, emitter disarmed");
        }
        pending.fire();
    }

    // ─── Safe-Mode Inhibit ──────────────────────────────────────────

    /// Output off, disarm and latch until `release_inhibit_deferred()`.
    /// Independent of the operator kill switch.
    pub(crate) fn inhibit_deferred(&self, pending: &mut EmitterEvents) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        if inner.inhibited {
            return;
        }
        inner.inhibited = true;
        inner.armed = false;
        inner.switch_off(now, pending);
        inner.set_state(EmitterState::EmergencyStop, pending);
        warn!("Emitter inhibited");
    }

    /// Release the safe-mode inhibit. The emitter stays disarmed and an
    /// engaged kill switch stays engaged.
    pub(crate) fn release_inhibit_deferred(&self, pending: &mut EmitterEvents) {
        let mut inner = self.inner.lock();
        if !inner.inhibited {
            return;
        }
        inner.inhibited = false;
        inner.armed = false;
        let next = inner.resting_state();
        inner.set_state(next, pending);
        info!("Emitter inhibit released, emitter disarmed");
    }

    // ─── Periodic ───────────────────────────────────────────────────

    /// Enforce the max-on limit and finish elapsed cooldowns.
    pub fn update(&self) {
        let now = self.clock.now();
        let mut pending = EmitterEvents::default();
        {
            let mut inner = self.inner.lock();

            if inner.state == EmitterState::Active && inner.on_time(now) >= inner.max_on {
                let max_on_ms = inner.max_on.as_millis() as u64;
                warn!(
                    event = "safety_timeout",
                    on_time_ms = inner.on_time(now).as_millis() as u64,
                    max_on_ms,
                    "Emitter max on-time reached, forcing off"
                );
                if let Some(on_time) = inner.switch_off(now, &mut pending) {
                    inner.stats.safety_timeout_count += 1;
                    if let Some(cb) = &inner.on_timeout {
                        pending.timeout = Some((on_time, Arc::clone(cb)));
                    }
                }
            }

            if inner.cooldown_until.is_some_and(|t| now >= t) {
                inner.cooldown_until = None;
                let next = inner.resting_state();
                inner.set_state(next, &mut pending);
                debug!("Emitter cooldown complete");
            }
        }
        pending.fire();
    }

    // ─── Queries ────────────────────────────────────────────────────

    pub fn state(&self) -> EmitterState {
        self.inner.lock().state
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state() == EmitterState::Active
    }

    pub fn is_armed(&self) -> bool {
        self.inner.lock().armed
    }

    pub fn is_kill_switch_engaged(&self) -> bool {
        self.inner.lock().kill_switch
    }

    pub fn is_inhibited(&self) -> bool {
        self.inner.lock().inhibited
    }

    pub fn max_on_time(&self) -> Duration {
        self.inner.lock().max_on
    }

    /// Length of the current session, zero when off.
    pub fn current_on_time(&self) -> Duration {
        let now = self.clock.now();
        self.inner.lock().on_time(now)
    }

    /// Time left before the max-on limit; the full limit when off.
    pub fn on_time_remaining(&self) -> Duration {
        let now = self.clock.now();
        let inner = self.inner.lock();
        inner.max_on.saturating_sub(inner.on_time(now))
    }

    pub fn cooldown_remaining(&self) -> Duration {
        let now = self.clock.now();
        self.inner.lock().cooldown_remaining(now)
    }

    pub fn stats(&self) -> EmitterStats {
        self.inner.lock().stats
    }

    // ─── Callbacks ──────────────────────────────────────────────────

    pub fn set_state_callback(&self, cb: Option<EmitterStateCallback>) {
        self.inner.lock().on_state_change = cb;
    }

    pub fn set_timeout_callback(&self, cb: Option<EmitterTimeoutCallback>) {
        self.inner.lock().on_timeout = cb;
    }

    /// Output off and release the driver.
    pub fn shutdown(&self) {
        self.deactivate();
        if let Err(e) = self.inner.lock().driver.shutdown() {
            warn!("Emitter driver shutdown failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use turret_common::clock::ManualClock;
    use turret_hal::drivers::simulation::{SimEmitterDriver, SimEmitterState};

    fn setup() -> (EmitterController, Arc<ManualClock>, Arc<SimEmitterState>) {
        let clock = Arc::new(ManualClock::new());
        let driver = SimEmitterDriver::new();
        let output = driver.state();
        let emitter =
            EmitterController::new(Box::new(driver), &EmitterConfig::default(), clock.clone())
                .unwrap();
        (emitter, clock, output)
    }

    #[test]
    fn starts_off_and_disarmed() {
        let (emitter, _, output) = setup();
        assert_eq!(emitter.state(), EmitterState::Off);
        assert!(!emitter.is_armed());
        assert!(!output.is_on());
    }

    #[test]
    fn activate_without_arm_is_refused() {
        let (emitter, _, output) = setup();
        assert_eq!(emitter.activate(), Err(EmitterError::NotArmed));
        assert_eq!(emitter.state(), EmitterState::Off);
        assert!(!output.is_on());
    }

    #[test]
    fn armed_activation_turns_output_on() {
        let (emitter, _, output) = setup();
        emitter.arm().unwrap();
        assert_eq!(emitter.state(), EmitterState::Armed);
        emitter.activate().unwrap();
        assert!(emitter.is_active());
        assert!(output.is_on());
        // Second activate is a no-op.
        emitter.activate().unwrap();
        assert_eq!(emitter.stats().activation_count, 1);
    }

    #[test]
    fn deactivate_is_idempotent_and_starts_cooldown() {
        let (emitter, clock, output) = setup();
        emitter.deactivate();
        assert_eq!(emitter.state(), EmitterState::Off);

        emitter.arm().unwrap();
        emitter.activate().unwrap();
        clock.advance_ms(1_200);
        emitter.deactivate();
        emitter.deactivate();
        assert!(!output.is_on());
        assert_eq!(emitter.state(), EmitterState::Cooldown);
        assert_eq!(emitter.stats().total_on_time, Duration::from_millis(1_200));
        assert_eq!(emitter.cooldown_remaining(), Duration::from_millis(5_000));
    }

    #[test]
    fn max_on_time_forces_off_within_one_update() {
        let (emitter, clock, output) = setup();
        let timeouts = Arc::new(AtomicU32::new(0));
        let seen = timeouts.clone();
        emitter.set_timeout_callback(Some(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })));

        emitter.arm().unwrap();
        emitter.activate().unwrap();
        clock.advance_ms(9_999);
        emitter.update();
        assert!(emitter.is_active());

        clock.advance_ms(1);
        emitter.update();
        assert!(!output.is_on());
        assert_eq!(emitter.state(), EmitterState::Cooldown);
        assert_eq!(emitter.stats().safety_timeout_count, 1);
        assert_eq!(timeouts.load(Ordering::SeqCst), 1);

        assert!(matches!(
            emitter.activate(),
            Err(EmitterError::InCooldown { remaining_ms: 5_000 })
        ));
        assert_eq!(emitter.stats().cooldown_block_count, 1);
    }

    #[test]
    fn cooldown_elapses_back_to_armed() {
        let (emitter, clock, _) = setup();
        emitter.arm().unwrap();
        emitter.activate().unwrap();
        emitter.deactivate();
        clock.advance_ms(4_999);
        emitter.update();
        assert_eq!(emitter.state(), EmitterState::Cooldown);
        clock.advance_ms(1);
        emitter.update();
        assert_eq!(emitter.state(), EmitterState::Armed);
        assert!(emitter.activate().is_ok());
    }

    #[test]
    fn cooldown_blocks_even_without_update() {
        let (emitter, clock, _) = setup();
        emitter.arm().unwrap();
        emitter.activate().unwrap();
        emitter.deactivate();
        clock.advance_ms(5_000);
        // Cooldown is judged by time, not by whether update() ran.
        assert!(emitter.activate().is_ok());
    }

    #[test]
    fn kill_switch_then_activate_reports_kill_switch() {
        let (emitter, _, output) = setup();
        emitter.arm().unwrap();
        emitter.activate().unwrap();
        emitter.kill_switch();
        assert!(!output.is_on());
        assert_eq!(emitter.state(), EmitterState::EmergencyStop);
        assert_eq!(emitter.activate(), Err(EmitterError::KillSwitchActive));
        assert_eq!(emitter.arm(), Err(EmitterError::KillSwitchActive));
    }

    #[test]
    fn reset_kill_switch_leaves_unit_disarmed() {
        let (emitter, clock, _) = setup();
        emitter.arm().unwrap();
        emitter.kill_switch();
        emitter.reset_kill_switch();
        assert!(!emitter.is_armed());
        assert!(!emitter.is_kill_switch_engaged());
        assert_eq!(emitter.state(), EmitterState::Off);
        assert_eq!(emitter.activate(), Err(EmitterError::NotArmed));
        clock.advance_ms(10);
        emitter.arm().unwrap();
        assert!(emitter.activate().is_ok());
    }

    #[test]
    fn inhibit_and_kill_switch_latch_independently() {
        let (emitter, _, output) = setup();
        emitter.arm().unwrap();
        emitter.activate().unwrap();
        emitter.kill_switch();

        let mut pending = EmitterEvents::default();
        emitter.inhibit_deferred(&mut pending);
        assert!(emitter.is_inhibited());
        emitter.release_inhibit_deferred(&mut pending);
        pending.fire();

        assert!(!emitter.is_inhibited());
        assert!(emitter.is_kill_switch_engaged());
        assert_eq!(emitter.state(), EmitterState::EmergencyStop);
        assert_eq!(emitter.arm(), Err(EmitterError::KillSwitchActive));
        assert!(!output.is_on());
    }

    #[test]
    fn inhibit_blocks_arm_and_activate_until_released() {
        let (emitter, _, output) = setup();
        emitter.arm().unwrap();
        let mut pending = EmitterEvents::default();
        emitter.inhibit_deferred(&mut pending);
        pending.fire();
        assert_eq!(emitter.activate(), Err(EmitterError::Inhibited));
        assert_eq!(emitter.arm(), Err(EmitterError::Inhibited));
        assert!(!output.is_on());

        let mut pending = EmitterEvents::default();
        emitter.release_inhibit_deferred(&mut pending);
        pending.fire();
        assert_eq!(emitter.state(), EmitterState::Off);
        assert!(!emitter.is_armed());
        emitter.arm().unwrap();
        assert!(emitter.activate().is_ok());
    }

    #[test]
    fn deferred_events_fire_only_when_released() {
        let (emitter, _, _) = setup();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        emitter.set_state_callback(Some(Arc::new(move |_: EmitterState, _: EmitterState| {
            seen.fetch_add(1, Ordering::SeqCst);
        })));
        let mut pending = EmitterEvents::default();
        emitter.arm_deferred(&mut pending).unwrap();
        emitter.activate_deferred(&mut pending).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        pending.fire();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disarm_switches_off() {
        let (emitter, _, output) = setup();
        emitter.arm().unwrap();
        emitter.activate().unwrap();
        emitter.disarm();
        assert!(!output.is_on());
        assert!(!emitter.is_armed());
        assert_eq!(emitter.state(), EmitterState::Cooldown);
    }

    #[test]
    fn on_time_bookkeeping() {
        let (emitter, clock, _) = setup();
        assert_eq!(emitter.current_on_time(), Duration::ZERO);
        assert_eq!(emitter.on_time_remaining(), Duration::from_secs(10));
        emitter.arm().unwrap();
        emitter.activate().unwrap();
        clock.advance_ms(2_500);
        assert_eq!(emitter.current_on_time(), Duration::from_millis(2_500));
        assert_eq!(emitter.on_time_remaining(), Duration::from_millis(7_500));
    }

    #[test]
    fn failed_output_write_leaves_emitter_off() {
        let (emitter, _, output) = setup();
        emitter.arm().unwrap();
        output.set_failing(true);
        assert!(matches!(emitter.activate(), Err(EmitterError::Driver(_))));
        assert!(!emitter.is_active());
        assert!(!output.is_on());
    }

    #[test]
    fn state_callback_sees_transitions() {
        let (emitter, _, _) = setup();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        emitter.set_state_callback(Some(Arc::new(move |old, new| {
            sink.lock().push((old, new));
        })));
        emitter.arm().unwrap();
        emitter.activate().unwrap();
        emitter.kill_switch();
        let log = log.lock();
        assert_eq!(log[0], (EmitterState::Off, EmitterState::Armed));
        assert_eq!(log[1], (EmitterState::Armed, EmitterState::Active));
        assert_eq!(log[2], (EmitterState::Active, EmitterState::EmergencyStop));
    }
}
