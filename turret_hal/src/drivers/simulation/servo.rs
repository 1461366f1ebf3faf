use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use tracing::{debug, info};
use turret_common::consts::PULSE_CENTER_US;
use turret_common::prelude::*;

/// Observable state of a simulated servo pair.
#[derive(Debug)]
pub struct SimServoState {
    pulses: [AtomicU32; 2],
    writes: AtomicU64,
    failing: AtomicBool,
    initialized: AtomicBool,
}

impl SimServoState {
    fn new() -> Self {
        Self {
            pulses: [AtomicU32::new(PULSE_CENTER_US), AtomicU32::new(PULSE_CENTER_US)],
            writes: AtomicU64::new(0),
            failing: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
        }
    }

    /// Last pulse width written for `axis` [µs].
    pub fn pulse_us(&self, axis: Axis) -> u32 {
        self.pulses[index(axis)].load(Ordering::Acquire)
    }

    /// Number of successful writes.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Acquire)
    }

    /// Make every following write fail, as a disconnected servo would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }
}

#[inline]
const fn index(axis: Axis) -> usize {
    match axis {
        Axis::Pan => 0,
        Axis::Tilt => 1,
    }
}

/// In-memory servo output.
#[derive(Debug, Clone)]
pub struct SimServoDriver {
    state: Arc<SimServoState>,
}

impl SimServoDriver {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SimServoState::new()),
        }
    }

    /// Shared handle to the recorded outputs.
    pub fn state(&self) -> Arc<SimServoState> {
        Arc::clone(&self.state)
    }
}

impl Default for SimServoDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ServoDriver for SimServoDriver {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn init(&mut self) -> Result<(), HalError> {
        self.state.initialized.store(true, Ordering::Release);
        info!("Simulated servo outputs ready");
        Ok(())
    }

    fn set_pulse_us(&mut self, axis: Axis, pulse_us: u32) -> Result<(), HalError> {
        if self.state.failing.load(Ordering::Acquire) {
            return Err(HalError::CommunicationError(format!(
                "simulated {axis} servo not responding"
            )));
        }
        self.state.pulses[index(axis)].store(pulse_us, Ordering::Release);
        self.state.writes.fetch_add(1, Ordering::AcqRel);
        debug!("PWM (sim): {} = {} us", axis, pulse_us);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), HalError> {
        self.state.initialized.store(false, Ordering::Release);
        Ok(())
    }
}
