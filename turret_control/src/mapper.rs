//! Coordinate mapper: camera pixels ↔ actuator angles.
//!
//! Forward transform:
//!
//! ```text
//! norm  = pixel / frame - 0.5            (range -0.5 .. 0.5)
//! raw   = (norm_x * fov_h, -norm_y * fov_v)
//! angle = raw * scale + offset
//! ```
//!
//! The inverse divides by `scale`; any scale with magnitude below
//! `MIN_SCALE_MAGNITUDE` is replaced by 1.0 before use. The transform never
//! clamps: limits are enforced by the actuator controller on commit.
//!
//! Camera parameters and the calibration record live behind one lock.
//! Every mutation validates while holding it, so a reader never observes a
//! half-written record.

pub mod calibration;

use heapless::Vec as FixedVec;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};
use turret_common::consts::{MAX_CALIBRATION_POINTS, MIN_SCALE_MAGNITUDE};
use turret_common::types::{CameraParams, PixelCoord, ServoPosition};

pub use calibration::{CalibrationFile, CalibrationStore};

/// Error types for mapper operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapperError {
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Calibration point buffer full ({0} points)")]
    PointsFull(usize),

    #[error("Calibration needs at least {need} point(s), have {have}")]
    InsufficientPoints { have: usize, need: usize },

    #[error("Calibration I/O error: {0}")]
    Io(String),

    #[error("Calibration file malformed: {0}")]
    Parse(String),
}

/// Per-axis correction applied after the geometric transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub offset_pan_deg: f32,
    pub offset_tilt_deg: f32,
    pub scale_pan: f32,
    pub scale_tilt: f32,
}

impl Calibration {
    pub const IDENTITY: Self = Self {
        offset_pan_deg: 0.0,
        offset_tilt_deg: 0.0,
        scale_pan: 1.0,
        scale_tilt: 1.0,
    };
}

impl Default for Calibration {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One operator-confirmed sample: where the target was seen, where the
/// emitter was pointing when it hit the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub pixel: PixelCoord,
    pub angle: ServoPosition,
}

/// Whether a forward-mapped pixel was inside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapOutcome {
    InBounds,
    /// Pixel outside the frame. The angle is still computed.
    OutOfBounds,
}

/// Result of [`CoordinateMapper::pixel_to_angle`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappedAngle {
    pub position: ServoPosition,
    pub outcome: MapOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapperStats {
    pub map_count: u64,
    pub out_of_bounds_count: u64,
    pub calibrations: u32,
}

/// Scale usable as a divisor.
#[inline]
pub fn effective_scale(scale: f32) -> f32 {
    if scale.is_finite() && scale.abs() >= MIN_SCALE_MAGNITUDE {
        scale
    } else {
        1.0
    }
}

#[derive(Debug)]
struct MapperState {
    camera: CameraParams,
    calibration: Calibration,
    points: FixedVec<CalibrationPoint, MAX_CALIBRATION_POINTS>,
    calibrated: bool,
    stats: MapperStats,
}

impl MapperState {
    /// Geometric angle before calibration.
    fn raw_angles(&self, p: PixelCoord) -> (f64, f64) {
        let cam = &self.camera;
        let norm_x = p.x as f64 / cam.width as f64 - 0.5;
        let norm_y = p.y as f64 / cam.height as f64 - 0.5;
        (norm_x * cam.fov_h_deg as f64, -norm_y * cam.fov_v_deg as f64)
    }

    fn forward(&self, p: PixelCoord) -> ServoPosition {
        let (raw_pan, raw_tilt) = self.raw_angles(p);
        let cal = &self.calibration;
        ServoPosition::new(
            (raw_pan * cal.scale_pan as f64 + cal.offset_pan_deg as f64) as f32,
            (raw_tilt * cal.scale_tilt as f64 + cal.offset_tilt_deg as f64) as f32,
        )
    }

    fn inverse(&self, angle: ServoPosition) -> PixelCoord {
        let cal = &self.calibration;
        let raw_pan =
            (angle.pan_deg as f64 - cal.offset_pan_deg as f64) / effective_scale(cal.scale_pan) as f64;
        let raw_tilt = (angle.tilt_deg as f64 - cal.offset_tilt_deg as f64)
            / effective_scale(cal.scale_tilt) as f64;

        let cam = &self.camera;
        let x = (raw_pan / cam.fov_h_deg as f64 + 0.5) * cam.width as f64;
        let y = (-raw_tilt / cam.fov_v_deg as f64 + 0.5) * cam.height as f64;
        PixelCoord::new(x.round() as i32, y.round() as i32)
    }

    fn to_file(&self, calibration: &Calibration) -> CalibrationFile {
        CalibrationFile {
            offset_pan_deg: calibration.offset_pan_deg,
            offset_tilt_deg: calibration.offset_tilt_deg,
            scale_pan: calibration.scale_pan,
            scale_tilt: calibration.scale_tilt,
            timestamp: 0,
            camera: self.camera,
            points: self.points.to_vec(),
        }
    }
}

/// Thread-safe pixel/angle transform with calibration.
#[derive(Debug)]
pub struct CoordinateMapper {
    inner: Mutex<MapperState>,
    store: Option<CalibrationStore>,
}

impl CoordinateMapper {
    /// Create a mapper with identity calibration.
    ///
    /// # Errors
    /// `MapperError::InvalidParam` if `camera` has a non-positive dimension.
    pub fn new(camera: CameraParams) -> Result<Self, MapperError> {
        camera.validate().map_err(MapperError::InvalidParam)?;
        info!(
            "Coordinate mapper: {}x{} px, FOV {:.1}x{:.1} deg",
            camera.width, camera.height, camera.fov_h_deg, camera.fov_v_deg
        );
        Ok(Self {
            inner: Mutex::new(MapperState {
                camera,
                calibration: Calibration::IDENTITY,
                points: FixedVec::new(),
                calibrated: false,
                stats: MapperStats::default(),
            }),
            store: None,
        })
    }

    /// Persist every successful calibration update to `store`.
    pub fn with_store(mut self, store: CalibrationStore) -> Self {
        self.store = Some(store);
        self
    }

    // ─── Transform ──────────────────────────────────────────────────

    /// Map a pixel to calibrated pan/tilt angles.
    pub fn pixel_to_angle(&self, pixel: PixelCoord) -> MappedAngle {
        let mut state = self.inner.lock();
        state.stats.map_count += 1;

        let outcome = if state.camera.contains(pixel) {
            MapOutcome::InBounds
        } else {
            state.stats.out_of_bounds_count += 1;
            debug!("Pixel ({}, {}) outside frame", pixel.x, pixel.y);
            MapOutcome::OutOfBounds
        };

        MappedAngle {
            position: state.forward(pixel),
            outcome,
        }
    }

    /// Map calibrated angles back to a pixel (nearest integer).
    pub fn angle_to_pixel(&self, angle: ServoPosition) -> PixelCoord {
        self.inner.lock().inverse(angle)
    }

    // ─── Camera ─────────────────────────────────────────────────────

    /// Replace the camera parameters. Rejected parameters leave the
    /// previous ones in effect.
    pub fn set_camera_params(&self, camera: CameraParams) -> Result<(), MapperError> {
        let mut state = self.inner.lock();
        if let Err(e) = camera.validate() {
            warn!("Rejected camera parameters: {e}");
            return Err(MapperError::InvalidParam(e));
        }
        state.camera = camera;
        info!(
            "Camera parameters updated: {}x{} px, FOV {:.1}x{:.1} deg",
            camera.width, camera.height, camera.fov_h_deg, camera.fov_v_deg
        );
        Ok(())
    }

    pub fn camera_params(&self) -> CameraParams {
        self.inner.lock().camera
    }

    // ─── Calibration values ─────────────────────────────────────────

    pub fn set_offsets(&self, pan_deg: f32, tilt_deg: f32) -> Result<(), MapperError> {
        if !(pan_deg.is_finite() && tilt_deg.is_finite()) {
            return Err(MapperError::InvalidParam(format!(
                "offsets must be finite, got ({pan_deg}, {tilt_deg})"
            )));
        }
        let mut state = self.inner.lock();
        state.calibration.offset_pan_deg = pan_deg;
        state.calibration.offset_tilt_deg = tilt_deg;
        debug!("Offsets set: pan={:.2} tilt={:.2}", pan_deg, tilt_deg);
        Ok(())
    }

    pub fn offsets(&self) -> (f32, f32) {
        let cal = self.inner.lock().calibration;
        (cal.offset_pan_deg, cal.offset_tilt_deg)
    }

    /// Set per-axis scales. Near-zero or non-finite scales become 1.0.
    pub fn set_scales(&self, pan: f32, tilt: f32) {
        let (pan_ok, tilt_ok) = (effective_scale(pan), effective_scale(tilt));
        if pan_ok != pan || tilt_ok != tilt {
            warn!("Invalid scale ({pan}, {tilt}) replaced with ({pan_ok}, {tilt_ok})");
        }
        let mut state = self.inner.lock();
        state.calibration.scale_pan = pan_ok;
        state.calibration.scale_tilt = tilt_ok;
    }

    pub fn scales(&self) -> (f32, f32) {
        let cal = self.inner.lock().calibration;
        (cal.scale_pan, cal.scale_tilt)
    }

    pub fn calibration(&self) -> Calibration {
        self.inner.lock().calibration
    }

    pub fn is_calibrated(&self) -> bool {
        self.inner.lock().calibrated
    }

    /// Back to identity calibration; collected points are dropped.
    pub fn reset_calibration(&self) {
        let mut state = self.inner.lock();
        state.calibration = Calibration::IDENTITY;
        state.points.clear();
        state.calibrated = false;
        info!("Calibration reset to identity");
    }

    // ─── Calibration procedure ──────────────────────────────────────

    /// Record a sample. Returns the number of points now held.
    pub fn add_point(&self, pixel: PixelCoord, angle: ServoPosition) -> Result<usize, MapperError> {
        let mut state = self.inner.lock();
        state
            .points
            .push(CalibrationPoint { pixel, angle })
            .map_err(|_| MapperError::PointsFull(MAX_CALIBRATION_POINTS))?;
        let count = state.points.len();
        info!(
            "Calibration point {}: pixel ({}, {}) -> angle ({:.2}, {:.2})",
            count, pixel.x, pixel.y, angle.pan_deg, angle.tilt_deg
        );
        Ok(count)
    }

    pub fn point_count(&self) -> usize {
        self.inner.lock().points.len()
    }

    pub fn clear_points(&self) {
        self.inner.lock().points.clear();
    }

    /// Derive the calibration from the collected points.
    ///
    /// Only the first point is used: offset = commanded − raw, scale = 1.0.
    /// Later points are accepted but do not refine the fit. When a store is
    /// attached the new record is written first and only committed if the
    /// write succeeds.
    pub fn compute_calibration(&self) -> Result<Calibration, MapperError> {
        let mut state = self.inner.lock();
        let first = *state.points.first().ok_or(MapperError::InsufficientPoints {
            have: 0,
            need: 1,
        })?;

        let (raw_pan, raw_tilt) = state.raw_angles(first.pixel);
        let next = Calibration {
            offset_pan_deg: (first.angle.pan_deg as f64 - raw_pan) as f32,
            offset_tilt_deg: (first.angle.tilt_deg as f64 - raw_tilt) as f32,
            scale_pan: 1.0,
            scale_tilt: 1.0,
        };
        if state.points.len() > 1 {
            debug!(
                "{} calibration points collected, scale fitting uses the first only",
                state.points.len()
            );
        }

        if let Some(store) = &self.store {
            store.save(&state.to_file(&next))?;
        }

        state.calibration = next;
        state.calibrated = true;
        state.stats.calibrations += 1;
        info!(
            "Calibration computed: offset=({:.2}, {:.2})",
            next.offset_pan_deg, next.offset_tilt_deg
        );
        Ok(next)
    }

    // ─── Persistence ────────────────────────────────────────────────

    /// Write the current record to `path`.
    pub fn save_calibration(&self, path: &Path) -> Result<(), MapperError> {
        let state = self.inner.lock();
        CalibrationStore::new(path).save(&state.to_file(&state.calibration))
    }

    /// Load a record from `path`. On any error the in-memory state is unchanged.
    pub fn load_calibration(&self, path: &Path) -> Result<(), MapperError> {
        let record = CalibrationStore::new(path)
            .load()?
            .ok_or_else(|| MapperError::Io(format!("{} not found", path.display())))?;
        record.camera.validate().map_err(MapperError::Parse)?;
        if ![record.offset_pan_deg, record.offset_tilt_deg].iter().all(|v| v.is_finite()) {
            return Err(MapperError::Parse("offsets must be finite".to_string()));
        }

        if record.points.len() > MAX_CALIBRATION_POINTS {
            warn!(
                "Calibration record holds {} points, keeping the first {}",
                record.points.len(),
                MAX_CALIBRATION_POINTS
            );
        }
        let points: FixedVec<CalibrationPoint, MAX_CALIBRATION_POINTS> = record
            .points
            .iter()
            .take(MAX_CALIBRATION_POINTS)
            .copied()
            .collect();

        let mut state = self.inner.lock();
        state.camera = record.camera;
        state.points = points;
        state.calibration = Calibration {
            offset_pan_deg: record.offset_pan_deg,
            offset_tilt_deg: record.offset_tilt_deg,
            scale_pan: effective_scale(record.scale_pan),
            scale_tilt: effective_scale(record.scale_tilt),
        };
        state.calibrated = true;
        info!(
            "Calibration loaded from {:?}: offset=({:.2}, {:.2}) scale=({:.3}, {:.3})",
            path,
            state.calibration.offset_pan_deg,
            state.calibration.offset_tilt_deg,
            state.calibration.scale_pan,
            state.calibration.scale_tilt
        );
        Ok(())
    }

    /// Startup load: any failure falls back to identity with a warning.
    /// Returns whether a record was applied.
    pub fn load_or_identity(&self, path: &Path) -> bool {
        match self.load_calibration(path) {
            Ok(()) => true,
            Err(e) => {
                warn!("Calibration not loaded from {:?} ({e}), using identity", path);
                let mut state = self.inner.lock();
                state.calibration = Calibration::IDENTITY;
                state.calibrated = false;
                false
            }
        }
    }

    pub fn stats(&self) -> MapperStats {
        self.inner.lock().stats
    }
}
