use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;
use turret_common::hal::driver::{EmitterDriver, HalError};

/// Observable state of a simulated emitter output.
#[derive(Debug, Default)]
pub struct SimEmitterState {
    on: AtomicBool,
    switch_ons: AtomicU64,
    failing: AtomicBool,
}

impl SimEmitterState {
    /// Current output level.
    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::Acquire)
    }

    /// Number of off→on edges written.
    pub fn switch_ons(&self) -> u64 {
        self.switch_ons.load(Ordering::Acquire)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }
}

/// In-memory emitter output.
#[derive(Debug, Clone, Default)]
pub struct SimEmitterDriver {
    state: Arc<SimEmitterState>,
}

impl SimEmitterDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Arc<SimEmitterState> {
        Arc::clone(&self.state)
    }
}

impl EmitterDriver for SimEmitterDriver {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn init(&mut self) -> Result<(), HalError> {
        self.state.on.store(false, Ordering::Release);
        Ok(())
    }

    fn set_output(&mut self, on: bool) -> Result<(), HalError> {
        // Switching off always succeeds so a failing output can never stay lit.
        if on && self.state.failing.load(Ordering::Acquire) {
            return Err(HalError::CommunicationError(
                "simulated emitter output not responding".to_string(),
            ));
        }
        let was_on = self.state.on.swap(on, Ordering::AcqRel);
        if on && !was_on {
            self.state.switch_ons.fetch_add(1, Ordering::AcqRel);
        }
        debug!("Emitter output (sim): {}", if on { "ON" } else { "OFF" });
        Ok(())
    }
}
