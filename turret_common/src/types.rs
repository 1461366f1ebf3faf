//! Value types shared by the control modules.

use crate::consts::{
    DEFAULT_CAMERA_HEIGHT, DEFAULT_CAMERA_WIDTH, DEFAULT_FOV_H_DEG, DEFAULT_FOV_V_DEG,
    PAN_CENTER_DEG, PAN_MAX_DEG, PAN_MIN_DEG, TILT_HOME_DEG, TILT_MAX_DEG, TILT_MIN_DEG,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Actuator axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Horizontal rotation.
    Pan,
    /// Vertical rotation. Never above horizontal.
    Tilt,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::Pan, Axis::Tilt];

    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Axis::Pan => "pan",
            Axis::Tilt => "tilt",
        }
    }

    /// Safe range `(min, max)` in degrees.
    #[inline]
    pub const fn limits(self) -> (f32, f32) {
        match self {
            Axis::Pan => (PAN_MIN_DEG, PAN_MAX_DEG),
            Axis::Tilt => (TILT_MIN_DEG, TILT_MAX_DEG),
        }
    }

    /// Geometric center of the range.
    #[inline]
    pub fn center(self) -> f32 {
        let (min, max) = self.limits();
        (min + max) / 2.0
    }

    /// Home angle.
    #[inline]
    pub const fn home(self) -> f32 {
        match self {
            Axis::Pan => PAN_CENTER_DEG,
            Axis::Tilt => TILT_HOME_DEG,
        }
    }

    /// Clamp an angle into the safe range. NaN maps to home.
    #[inline]
    pub fn clamp(self, deg: f32) -> f32 {
        if deg.is_nan() {
            return self.home();
        }
        let (min, max) = self.limits();
        deg.clamp(min, max)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pan/tilt angle pair [deg].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ServoPosition {
    pub pan_deg: f32,
    pub tilt_deg: f32,
}

impl ServoPosition {
    pub const fn new(pan_deg: f32, tilt_deg: f32) -> Self {
        Self { pan_deg, tilt_deg }
    }

    /// Home position: pan centered, tilt halfway down.
    pub const fn home() -> Self {
        Self::new(PAN_CENTER_DEG, TILT_HOME_DEG)
    }

    #[inline]
    pub const fn get(&self, axis: Axis) -> f32 {
        match axis {
            Axis::Pan => self.pan_deg,
            Axis::Tilt => self.tilt_deg,
        }
    }

    #[inline]
    pub fn set(&mut self, axis: Axis, deg: f32) {
        match axis {
            Axis::Pan => self.pan_deg = deg,
            Axis::Tilt => self.tilt_deg = deg,
        }
    }

    /// Both axes clamped to their safe ranges.
    pub fn clamped(&self) -> Self {
        Self::new(Axis::Pan.clamp(self.pan_deg), Axis::Tilt.clamp(self.tilt_deg))
    }
}

/// Pixel coordinate in the camera frame. Origin top-left, y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelCoord {
    pub x: i32,
    pub y: i32,
}

impl PixelCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Camera geometry used by the pixel/angle transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraParams {
    /// Frame width [px].
    pub width: u32,
    /// Frame height [px].
    pub height: u32,
    /// Horizontal field of view [deg].
    pub fov_h_deg: f32,
    /// Vertical field of view [deg].
    pub fov_v_deg: f32,
}

impl CameraParams {
    /// Check that every dimension is strictly positive and finite.
    ///
    /// # Errors
    /// Returns a description of the first offending field.
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 {
            return Err("width must be > 0".to_string());
        }
        if self.height == 0 {
            return Err("height must be > 0".to_string());
        }
        if !(self.fov_h_deg.is_finite() && self.fov_h_deg > 0.0) {
            return Err(format!("fov_h_deg must be > 0, got {}", self.fov_h_deg));
        }
        if !(self.fov_v_deg.is_finite() && self.fov_v_deg > 0.0) {
            return Err(format!("fov_v_deg must be > 0, got {}", self.fov_v_deg));
        }
        Ok(())
    }

    /// Whether the pixel lies inside the frame.
    #[inline]
    pub fn contains(&self, p: PixelCoord) -> bool {
        p.x >= 0 && p.y >= 0 && (p.x as i64) < self.width as i64 && (p.y as i64) < self.height as i64
    }
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            width: DEFAULT_CAMERA_WIDTH,
            height: DEFAULT_CAMERA_HEIGHT,
            fov_h_deg: DEFAULT_FOV_H_DEG,
            fov_v_deg: DEFAULT_FOV_V_DEG,
        }
    }
}

/// Axis-aligned bounding box in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Integer center of the box.
    #[inline]
    pub const fn centroid(&self) -> PixelCoord {
        PixelCoord::new(
            self.x.saturating_add((self.width / 2) as i32),
            self.y.saturating_add((self.height / 2) as i32),
        )
    }
}

/// One detection from the vision pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Detector confidence in `[0, 1]`. Informational only.
    pub confidence: f32,
}

impl Detection {
    pub const fn new(bbox: BoundingBox, confidence: f32) -> Self {
        Self { bbox, confidence }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_clamp_respects_limits() {
        assert_eq!(Axis::Pan.clamp(90.0), PAN_MAX_DEG);
        assert_eq!(Axis::Pan.clamp(-90.0), PAN_MIN_DEG);
        assert_eq!(Axis::Tilt.clamp(15.0), TILT_MAX_DEG);
        assert_eq!(Axis::Tilt.clamp(-45.0), TILT_MIN_DEG);
        assert_eq!(Axis::Tilt.clamp(-10.0), -10.0);
    }

    #[test]
    fn axis_clamp_nan_goes_home() {
        assert_eq!(Axis::Tilt.clamp(f32::NAN), TILT_HOME_DEG);
        assert_eq!(Axis::Pan.clamp(f32::NAN), PAN_CENTER_DEG);
    }

    #[test]
    fn tilt_center_equals_home() {
        assert_eq!(Axis::Tilt.center(), Axis::Tilt.home());
        assert_eq!(Axis::Pan.center(), Axis::Pan.home());
    }

    #[test]
    fn home_position() {
        let home = ServoPosition::home();
        assert_eq!(home.get(Axis::Pan), 0.0);
        assert_eq!(home.get(Axis::Tilt), -15.0);
    }

    #[test]
    fn camera_params_rejects_zero_and_negative() {
        assert!(CameraParams::default().validate().is_ok());
        let mut p = CameraParams::default();
        p.width = 0;
        assert!(p.validate().is_err());
        let mut p = CameraParams::default();
        p.fov_h_deg = -1.0;
        assert!(p.validate().is_err());
        let mut p = CameraParams::default();
        p.fov_v_deg = 0.0;
        assert!(p.validate().is_err());
        let mut p = CameraParams::default();
        p.fov_v_deg = f32::NAN;
        assert!(p.validate().is_err());
    }

    #[test]
    fn camera_contains() {
        let p = CameraParams::default();
        assert!(p.contains(PixelCoord::new(0, 0)));
        assert!(p.contains(PixelCoord::new(639, 479)));
        assert!(!p.contains(PixelCoord::new(640, 0)));
        assert!(!p.contains(PixelCoord::new(-1, 10)));
    }

    #[test]
    fn bbox_area_and_centroid() {
        let b = BoundingBox::new(100, 200, 10, 15);
        assert_eq!(b.area(), 150);
        assert_eq!(b.centroid(), PixelCoord::new(105, 207));
    }
}
