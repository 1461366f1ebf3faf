//! Linux sysfs drivers.
//!
//! Both drivers degrade to a logged mock mode when the sysfs nodes are not
//! present (development hosts, containers) so the binary still starts.

mod gpio;
mod pwm;

pub use gpio::SysfsGpioDriver;
pub use pwm::SysfsPwmDriver;

use std::fmt::Display;
use std::fs;
use std::io;
use std::path::Path;
use tracing::error;
use turret_common::hal::driver::FaultIndicator;

/// Write one attribute value.
pub(crate) fn write_attr(path: &Path, value: impl Display) -> io::Result<()> {
    fs::write(path, value.to_string())
}

/// Fault indicator that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogIndicator;

impl FaultIndicator for LogIndicator {
    fn set_fault(&self, active: bool) {
        if active {
            error!(event = "fault_indicator", "Fault indicator raised");
        }
    }
}
