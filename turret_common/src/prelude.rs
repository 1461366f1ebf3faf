//! Prelude module for common re-exports.
//!
//! ```rust
//! use turret_common::prelude::*;
//! ```

// ─── Time ───────────────────────────────────────────────────────────
pub use crate::clock::{Clock, ManualClock, MonotonicClock};

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── Value Types ────────────────────────────────────────────────────
pub use crate::types::{Axis, BoundingBox, CameraParams, Detection, PixelCoord, ServoPosition};

// ─── Drivers ────────────────────────────────────────────────────────
pub use crate::hal::driver::{EmitterDriver, FaultIndicator, HalError, ServoDriver};
