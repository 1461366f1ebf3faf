//! Sinusoidal pan sweep superimposed on the aim point while tracking.
//!
//! Tilt is held at the aimed value. The phase runs from the start of the
//! engagement, so moving the centre on a new detection never restarts it.

use std::f32::consts::TAU;
use std::time::Duration;

use turret_common::types::ServoPosition;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sweep {
    amplitude_deg: f32,
    frequency_hz: f32,
    started_at: Duration,
}

impl Sweep {
    pub const fn new(amplitude_deg: f32, frequency_hz: f32, started_at: Duration) -> Self {
        Self {
            amplitude_deg,
            frequency_hz,
            started_at,
        }
    }

    #[inline]
    fn elapsed_secs(&self, now: Duration) -> f32 {
        now.saturating_sub(self.started_at).as_secs_f32()
    }

    /// Pan offset at `now` [deg].
    pub fn offset_deg(&self, now: Duration) -> f32 {
        self.amplitude_deg * (TAU * self.frequency_hz * self.elapsed_secs(now)).sin()
    }

    /// Full cycles completed by `now`.
    pub fn cycles(&self, now: Duration) -> u32 {
        (self.elapsed_secs(now) * self.frequency_hz).floor() as u32
    }

    /// Aim point with the sweep applied. Not clamped.
    pub fn apply(&self, center: ServoPosition, now: Duration) -> ServoPosition {
        ServoPosition::new(center.pan_deg + self.offset_deg(now), center.tilt_deg)
    }
}
