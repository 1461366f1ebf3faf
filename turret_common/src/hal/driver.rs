//! Driver traits and error types.
//!
//! This module defines:
//! - `ServoDriver` trait - pan/tilt pulse output
//! - `EmitterDriver` trait - binary emitter output
//! - `FaultIndicator` trait - operator-visible fault output
//! - `HalError` enum - error types for driver operations

use crate::types::Axis;
use thiserror::Error;

/// Error types for driver operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HalError {
    /// Driver initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Hardware communication error
    #[error("Hardware communication error: {0}")]
    CommunicationError(String),

    /// Requested output is not present on this platform
    #[error("Output not available: {0}")]
    NotAvailable(String),
}

/// Pan/tilt servo output.
///
/// The actuator controller converts angles to pulse widths and calls
/// `set_pulse_us` for every interpolation step. Servos are open loop:
/// a successful write says nothing about where the horn actually is.
///
/// # Lifecycle
///
/// 1. `init()` - called once before the first write
/// 2. `set_pulse_us()` - called from the supervisory tick
/// 3. `shutdown()` - called on exit
pub trait ServoDriver: Send {
    /// Returns the driver's identifier (e.g. "simulation", "sysfs-pwm").
    fn name(&self) -> &'static str;

    /// Prepare the outputs. Drivers that cannot reach hardware may degrade
    /// to a logged mock mode instead of failing.
    ///
    /// # Errors
    /// Return `HalError::InitFailed` if the output cannot be prepared at all.
    fn init(&mut self) -> Result<(), HalError>;

    /// Write one pulse width for `axis`.
    ///
    /// # Errors
    /// Return `HalError::CommunicationError` if the write did not reach the output.
    fn set_pulse_us(&mut self, axis: Axis, pulse_us: u32) -> Result<(), HalError>;

    /// Release the outputs.
    fn shutdown(&mut self) -> Result<(), HalError> {
        Ok(())
    }
}

/// Binary emitter output.
pub trait EmitterDriver: Send {
    fn name(&self) -> &'static str;

    fn init(&mut self) -> Result<(), HalError>;

    /// Drive the output on or off.
    ///
    /// # Errors
    /// Return `HalError::CommunicationError` if the level could not be written.
    fn set_output(&mut self, on: bool) -> Result<(), HalError>;

    /// Force the output low and release it.
    fn shutdown(&mut self) -> Result<(), HalError> {
        self.set_output(false)
    }
}

/// Operator-visible fault output (status LED or similar).
///
/// Called outside component locks, so implementations use interior
/// mutability.
pub trait FaultIndicator: Send + Sync {
    fn set_fault(&self, active: bool);
}

/// Indicator that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullIndicator;

impl FaultIndicator for NullIndicator {
    fn set_fault(&self, _active: bool) {}
}
