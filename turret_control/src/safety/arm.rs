//! Arm/disarm collaborator interface.
//!
//! The button subsystem (debounce, LEDs, long-press handling) lives outside
//! this crate. The safety layer only reads an armed level and an
//! emergency-stop latch through [`ArmInput`].

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Read side of the arm/disarm collaborator.
pub trait ArmInput: Send + Sync {
    /// Operator has armed the system.
    fn is_armed(&self) -> bool;

    /// Emergency stop is asserted.
    fn is_emergency_stop(&self) -> bool;

    /// Release a latched emergency stop after an operator reset.
    fn clear_emergency(&self) {}
}

/// In-process arm input driven by setter calls.
#[derive(Debug, Default)]
pub struct SharedArmInput {
    armed: AtomicBool,
    emergency: AtomicBool,
}

impl SharedArmInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_armed(&self, armed: bool) {
        if self.armed.swap(armed, Ordering::AcqRel) != armed {
            info!("Arm input: {}", if armed { "ARMED" } else { "DISARMED" });
        }
    }

    /// Latch the emergency stop; also drops the armed level.
    pub fn trigger_emergency_stop(&self) {
        self.armed.store(false, Ordering::Release);
        self.emergency.store(true, Ordering::Release);
        warn!("Arm input: EMERGENCY STOP");
    }
}

impl ArmInput for SharedArmInput {
    fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    fn is_emergency_stop(&self) -> bool {
        self.emergency.load(Ordering::Acquire)
    }

    fn clear_emergency(&self) {
        self.emergency.store(false, Ordering::Release);
    }
}
