//! # Turret Control
//!
//! Targeting and safety core for a pan/tilt emitter turret.
//!
//! ## Components
//!
//! 1. **CoordinateMapper**: camera pixel ↔ pan/tilt angle, calibration
//! 2. **ServoController**: clamped, interpolated moves and a movement watchdog
//! 3. **EmitterController**: on/off state machine, max on-time, cooldown, kill switch
//! 4. **TargetingEngine**: best-target selection, track/sweep state machine
//! 5. **SafetyLayer**: the only path to emitter activation; watchdog, brownout, safe mode
//!
//! Each component guards its state with one lock. Locks are taken in the
//! order safety → emitter / actuator, and callbacks fire after release.

pub mod config;
pub mod cycle;
pub mod emitter;
pub mod mapper;
pub mod safety;
pub mod servo;
pub mod targeting;

pub use config::TurretConfig;
pub use cycle::{CycleRunner, CycleStats, Turret, TurretError};
