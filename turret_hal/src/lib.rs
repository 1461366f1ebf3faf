//! # Turret HAL
//!
//! Driver implementations for the traits in `turret_common::hal::driver`:
//!
//! - [`drivers::simulation`] - in-memory drivers with failure injection
//! - [`drivers::sysfs`] - Linux sysfs PWM servo and GPIO emitter outputs
//!
//! [`drivers::create_drivers`] builds a full driver set from configuration.

pub mod drivers;

pub use drivers::{DriverKind, DriverSet, HardwareConfig, create_drivers};
