//! Angle ↔ pulse-width conversion.
//!
//! Each axis maps its full safe range linearly onto
//! `PULSE_MIN_US ..= PULSE_MAX_US`, so an axis center lands on
//! `PULSE_CENTER_US`.

use turret_common::consts::{ANGLE_EPSILON_DEG, PULSE_MAX_US, PULSE_MIN_US};
use turret_common::types::Axis;

/// Pulse width for `deg`, clamped to the axis range first.
pub fn angle_to_pulse_us(axis: Axis, deg: f32) -> u32 {
    let (min, max) = axis.limits();
    let normalized = (axis.clamp(deg) - min) / (max - min);
    let span = (PULSE_MAX_US - PULSE_MIN_US) as f32;
    PULSE_MIN_US + (normalized * span).round() as u32
}

/// Angle for a pulse width, clamped to the pulse range first.
pub fn pulse_us_to_angle(axis: Axis, pulse_us: u32) -> f32 {
    let (min, max) = axis.limits();
    let pulse = pulse_us.clamp(PULSE_MIN_US, PULSE_MAX_US);
    let normalized = (pulse - PULSE_MIN_US) as f32 / (PULSE_MAX_US - PULSE_MIN_US) as f32;
    min + normalized * (max - min)
}

/// Whether `deg` lies inside the axis range, with a small tolerance.
#[inline]
pub fn is_angle_valid(axis: Axis, deg: f32) -> bool {
    let (min, max) = axis.limits();
    deg >= min - ANGLE_EPSILON_DEG && deg <= max + ANGLE_EPSILON_DEG
}
