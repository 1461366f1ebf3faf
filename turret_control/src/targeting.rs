//! Targeting engine: best-target selection and the track/sweep state machine.
//!
//! ```text
//! Idle ──detection above min area──▶ Tracking ──loss timeout / cancel──▶ Idle
//! ```
//!
//! Detection batches are the only way out of `Idle`. While tracking, each
//! batch recentres the aim point and `update()` re-issues the aim with the
//! pan sweep applied. Emitter activation is requested through the safety
//! layer only after the move has been issued.
//!
//! The engine lock is never held while calling the mapper, the actuator or
//! the safety layer, and callbacks fire after it is released. Callbacks must
//! not call back into the engine synchronously.
//!
//! Every engagement carries a generation number that is bumped when it
//! ends. A batch re-checks its generation after requesting activation, so a
//! cancel or loss timeout that stood down while the lock was released
//! cannot leave the emitter on.

pub mod selection;
pub mod sweep;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use turret_common::clock::Clock;
use turret_common::types::{BoundingBox, Detection, PixelCoord, ServoPosition};

use crate::config::TargetingConfig;
use crate::emitter::EmitterController;
use crate::mapper::{CoordinateMapper, MapOutcome};
use crate::safety::SafetyLayer;
use crate::servo::ServoController;

pub use selection::{Selection, select_target};
pub use sweep::Sweep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetState {
    Idle,
    Tracking,
}

impl TargetState {
    pub const fn name(self) -> &'static str {
        match self {
            TargetState::Idle => "IDLE",
            TargetState::Tracking => "TRACKING",
        }
    }
}

/// The one target currently tracked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetInfo {
    pub bbox: BoundingBox,
    pub centroid: PixelCoord,
    pub area: u64,
    /// Start of the engagement.
    pub first_seen: Duration,
    pub last_seen: Duration,
}

impl TargetInfo {
    #[inline]
    pub fn tracked_for(&self, now: Duration) -> Duration {
        now.saturating_sub(self.first_seen)
    }
}

/// Why tracking ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossReason {
    Timeout,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetingStats {
    pub batches_processed: u64,
    pub targets_acquired: u32,
    pub targets_lost: u32,
    pub multi_target_frames: u32,
    pub sweep_cycles: u32,
    pub total_track_time: Duration,
}

pub type TargetStateCallback = Arc<dyn Fn(TargetState, TargetState) + Send + Sync>;
pub type TargetAcquiredCallback = Arc<dyn Fn(&TargetInfo) + Send + Sync>;
/// Called with the tracked duration of the lost engagement.
pub type TargetLostCallback = Arc<dyn Fn(Duration) + Send + Sync>;

struct TargetingInner {
    config: TargetingConfig,
    state: TargetState,
    target: Option<TargetInfo>,
    aim: ServoPosition,
    sweep: Option<Sweep>,
    sweep_cycles_counted: u32,
    generation: u64,
    stats: TargetingStats,
    on_state_change: Option<TargetStateCallback>,
    on_acquired: Option<TargetAcquiredCallback>,
    on_lost: Option<TargetLostCallback>,
}

#[derive(Default)]
struct Pending {
    state_change: Option<(TargetState, TargetState, TargetStateCallback)>,
    acquired: Option<(TargetInfo, TargetAcquiredCallback)>,
    lost: Option<(Duration, TargetLostCallback)>,
}

impl Pending {
    fn fire(self) {
        if let Some((old, new, cb)) = self.state_change {
            cb(old, new);
        }
        if let Some((info, cb)) = self.acquired {
            cb(&info);
        }
        if let Some((tracked, cb)) = self.lost {
            cb(tracked);
        }
    }
}

impl TargetingInner {
    fn set_state(&mut self, new: TargetState, pending: &mut Pending) {
        let old = self.state;
        if old == new {
            return;
        }
        self.state = new;
        info!("Targeting: {} -> {}", old.name(), new.name());
        if let Some(cb) = &self.on_state_change {
            pending.state_change = Some((old, new, Arc::clone(cb)));
        }
    }

    fn count_sweep_cycles(&mut self, now: Duration) {
        if let Some(sweep) = self.sweep {
            let cycles = sweep.cycles(now);
            if cycles > self.sweep_cycles_counted {
                self.stats.sweep_cycles += cycles - self.sweep_cycles_counted;
                self.sweep_cycles_counted = cycles;
            }
        }
    }

    /// Drop the target and go Idle. Returns the tracked duration.
    fn lose(&mut self, now: Duration, reason: LossReason, pending: &mut Pending) -> Option<Duration> {
        let target = self.target.take()?;
        self.generation = self.generation.wrapping_add(1);
        self.count_sweep_cycles(now);
        self.sweep = None;
        self.sweep_cycles_counted = 0;

        let tracked = target.tracked_for(now);
        self.stats.targets_lost += 1;
        self.stats.total_track_time += tracked;
        info!(
            "Target lost ({:?}) after {} ms",
            reason,
            tracked.as_millis()
        );
        self.set_state(TargetState::Idle, pending);
        if let Some(cb) = &self.on_lost {
            pending.lost = Some((tracked, Arc::clone(cb)));
        }
        Some(tracked)
    }
}

/// Track/sweep state machine driving the actuator and requesting activation.
pub struct TargetingEngine {
    inner: Mutex<TargetingInner>,
    mapper: Arc<CoordinateMapper>,
    servo: Arc<ServoController>,
    emitter: Arc<EmitterController>,
    safety: Arc<SafetyLayer>,
    clock: Arc<dyn Clock>,
}

impl TargetingEngine {
    pub fn new(
        config: &TargetingConfig,
        mapper: Arc<CoordinateMapper>,
        servo: Arc<ServoController>,
        emitter: Arc<EmitterController>,
        safety: Arc<SafetyLayer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!(
            "Targeting engine ready: min area {} px, lost after {} ms, sweep ±{:.1} deg at {:.1} Hz",
            config.min_area,
            config.lost_timeout_ms,
            config.sweep_amplitude_deg,
            config.sweep_frequency_hz
        );
        Self {
            inner: Mutex::new(TargetingInner {
                config: config.clone(),
                state: TargetState::Idle,
                target: None,
                aim: ServoPosition::home(),
                sweep: None,
                sweep_cycles_counted: 0,
                generation: 0,
                stats: TargetingStats::default(),
                on_state_change: None,
                on_acquired: None,
                on_lost: None,
            }),
            mapper,
            servo,
            emitter,
            safety,
            clock,
        }
    }

    // ─── Detections ─────────────────────────────────────────────────

    /// Consume one frame's detections.
    ///
    /// Returns the tracked target if this batch selected one. A batch with
    /// no candidate leaves the state alone; the loss timeout decides.
    pub fn process_detections(&self, detections: &[Detection]) -> Option<TargetInfo> {
        let now = self.clock.now();
        let min_area = self.inner.lock().config.min_area;
        let selection = select_target(detections, min_area);

        let mut pending = Pending::default();
        let Some(best) = selection.best else {
            let mut inner = self.inner.lock();
            inner.stats.batches_processed += 1;
            return None;
        };

        let centroid = best.bbox.centroid();
        let mapped = self.mapper.pixel_to_angle(centroid);
        if mapped.outcome == MapOutcome::OutOfBounds {
            debug!("Target centroid outside frame, aiming anyway");
        }

        let engagement = {
            let mut inner = self.inner.lock();
            inner.stats.batches_processed += 1;
            if selection.is_multi_target() {
                inner.stats.multi_target_frames += 1;
                debug!("{} candidates in frame, tracking the largest", selection.candidates);
            }

            let first_seen = match (inner.state, inner.target) {
                (TargetState::Tracking, Some(t)) => t.first_seen,
                _ => now,
            };
            let info = TargetInfo {
                bbox: best.bbox,
                centroid,
                area: best.bbox.area(),
                first_seen,
                last_seen: now,
            };
            inner.target = Some(info);
            inner.aim = mapped.position;

            if inner.state == TargetState::Idle {
                inner.sweep = Some(Sweep::new(
                    inner.config.sweep_amplitude_deg,
                    inner.config.sweep_frequency_hz,
                    now,
                ));
                inner.sweep_cycles_counted = 0;
                inner.stats.targets_acquired += 1;
                info!(
                    "Target acquired: area {} at ({}, {}) -> pan {:.1} tilt {:.1}",
                    info.area, centroid.x, centroid.y, mapped.position.pan_deg, mapped.position.tilt_deg
                );
                inner.set_state(TargetState::Tracking, &mut pending);
                if let Some(cb) = &inner.on_acquired {
                    pending.acquired = Some((info, Arc::clone(cb)));
                }
            }

            let command = inner
                .sweep
                .map_or(inner.aim, |s| s.apply(inner.aim, now));
            (info, command, inner.generation)
        };
        let (info, command, generation) = engagement;

        if self.is_current(generation) {
            self.safety.set_detection_active(true);
            match self.servo.move_to(command.pan_deg, command.tilt_deg) {
                Ok(_) => {
                    if !self.emitter.is_active() {
                        // Outcome is logged and kept in the safety snapshot.
                        let _ = self.safety.request_activation();
                    }
                }
                Err(e) => warn!("Aim not issued, activation skipped: {e}"),
            }
            self.retire_if_ended(generation);
        }

        pending.fire();
        Some(info)
    }

    /// `generation` is still the engagement being tracked.
    fn is_current(&self, generation: u64) -> bool {
        let inner = self.inner.lock();
        inner.target.is_some() && inner.generation == generation
    }

    /// Undo a late activation if the engagement ended concurrently.
    fn retire_if_ended(&self, generation: u64) {
        if self.is_current(generation) {
            return;
        }
        debug!("Engagement ended during activation, standing down");
        self.safety.deactivate();
        self.safety.set_detection_active(false);
    }

    // ─── Periodic ───────────────────────────────────────────────────

    /// Loss timeout and sweep recomputation.
    pub fn update(&self) {
        let now = self.clock.now();
        let mut pending = Pending::default();

        let command = {
            let mut inner = self.inner.lock();
            let Some(target) = inner.target else {
                return;
            };
            let timeout = Duration::from_millis(inner.config.lost_timeout_ms);
            if now.saturating_sub(target.last_seen) >= timeout {
                inner.lose(now, LossReason::Timeout, &mut pending);
                None
            } else {
                inner.count_sweep_cycles(now);
                Some(inner.sweep.map_or(inner.aim, |s| s.apply(inner.aim, now)))
            }
        };

        match command {
            Some(aim) => {
                if let Err(e) = self.servo.move_to(aim.pan_deg, aim.tilt_deg) {
                    debug!("Sweep step not issued: {e}");
                }
            }
            None => self.stand_down(),
        }
        pending.fire();
    }

    /// Stop tracking now. Returns false if nothing was tracked.
    pub fn cancel(&self) -> bool {
        let now = self.clock.now();
        let mut pending = Pending::default();
        let lost = self
            .inner
            .lock()
            .lose(now, LossReason::Cancelled, &mut pending)
            .is_some();
        if lost {
            self.stand_down();
        }
        pending.fire();
        lost
    }

    /// Emitter off, actuator home, detection cleared.
    fn stand_down(&self) {
        self.safety.deactivate();
        if let Err(e) = self.servo.home() {
            warn!("Home after target loss not issued: {e}");
        }
        self.safety.set_detection_active(false);
    }

    // ─── Queries ────────────────────────────────────────────────────

    pub fn state(&self) -> TargetState {
        self.inner.lock().state
    }

    #[inline]
    pub fn is_tracking(&self) -> bool {
        self.state() == TargetState::Tracking
    }

    pub fn target(&self) -> Option<TargetInfo> {
        self.inner.lock().target
    }

    /// Aim point without the sweep, if tracking.
    pub fn aim(&self) -> Option<ServoPosition> {
        let inner = self.inner.lock();
        inner.target.map(|_| inner.aim)
    }

    pub fn stats(&self) -> TargetingStats {
        self.inner.lock().stats
    }

    // ─── Callbacks ──────────────────────────────────────────────────

    pub fn set_state_callback(&self, cb: Option<TargetStateCallback>) {
        self.inner.lock().on_state_change = cb;
    }

    pub fn set_acquired_callback(&self, cb: Option<TargetAcquiredCallback>) {
        self.inner.lock().on_acquired = cb;
    }

    pub fn set_lost_callback(&self, cb: Option<TargetLostCallback>) {
        self.inner.lock().on_lost = cb;
    }
}
