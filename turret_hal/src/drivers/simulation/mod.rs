//! Simulation drivers.
//!
//! Outputs are recorded in shared state objects so tests can inspect what
//! the control core wrote and inject write failures.

mod emitter;
mod indicator;
mod servo;

pub use emitter::{SimEmitterDriver, SimEmitterState};
pub use indicator::SimIndicator;
pub use servo::{SimServoDriver, SimServoState};

use std::sync::Arc;
use turret_common::hal::driver::FaultIndicator;

/// Build a fresh simulation driver set.
pub fn create_drivers() -> (SimServoDriver, SimEmitterDriver, Arc<dyn FaultIndicator>) {
    (
        SimServoDriver::new(),
        SimEmitterDriver::new(),
        Arc::new(SimIndicator::new()),
    )
}
