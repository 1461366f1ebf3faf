use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use turret_common::hal::driver::FaultIndicator;

/// Simulated fault LED.
#[derive(Debug, Default)]
pub struct SimIndicator {
    fault: AtomicBool,
    raised: AtomicU32,
}

impl SimIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fault(&self) -> bool {
        self.fault.load(Ordering::Acquire)
    }

    /// Number of times the fault output was raised.
    pub fn raised(&self) -> u32 {
        self.raised.load(Ordering::Acquire)
    }
}

impl FaultIndicator for SimIndicator {
    fn set_fault(&self, active: bool) {
        let was = self.fault.swap(active, Ordering::AcqRel);
        if active && !was {
            self.raised.fetch_add(1, Ordering::AcqRel);
        }
    }
}
