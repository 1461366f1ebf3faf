//! Driver implementations.
//!
//! - [`simulation`] - software outputs for development and testing
//! - [`sysfs`] - Linux sysfs PWM / GPIO outputs with mock fallback

pub mod simulation;
pub mod sysfs;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use turret_common::hal::driver::{EmitterDriver, FaultIndicator, ServoDriver};

/// Which backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    #[default]
    Simulation,
    Sysfs,
}

/// Hardware wiring.
///
/// # TOML Example
///
/// ```toml
/// [hardware]
/// driver = "sysfs"
/// pwm_chip = "/sys/class/pwm/pwmchip2"
/// pan_channel = 0
/// tilt_channel = 1
/// emitter_gpio = 23
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareConfig {
    #[serde(default)]
    pub driver: DriverKind,
    #[serde(default = "default_pwm_chip")]
    pub pwm_chip: PathBuf,
    #[serde(default)]
    pub pan_channel: u32,
    #[serde(default = "default_tilt_channel")]
    pub tilt_channel: u32,
    #[serde(default = "default_gpio_base")]
    pub gpio_base: PathBuf,
    #[serde(default = "default_emitter_gpio")]
    pub emitter_gpio: u32,
}

fn default_pwm_chip() -> PathBuf {
    PathBuf::from("/sys/class/pwm/pwmchip2")
}

fn default_tilt_channel() -> u32 {
    1
}

fn default_gpio_base() -> PathBuf {
    PathBuf::from("/sys/class/gpio")
}

fn default_emitter_gpio() -> u32 {
    23
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::default(),
            pwm_chip: default_pwm_chip(),
            pan_channel: 0,
            tilt_channel: default_tilt_channel(),
            gpio_base: default_gpio_base(),
            emitter_gpio: default_emitter_gpio(),
        }
    }
}

impl HardwareConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.pan_channel == self.tilt_channel {
            return Err(format!(
                "pan_channel and tilt_channel must differ (both {})",
                self.pan_channel
            ));
        }
        Ok(())
    }
}

/// Outputs handed to the control core.
pub struct DriverSet {
    pub servo: Box<dyn ServoDriver>,
    pub emitter: Box<dyn EmitterDriver>,
    pub indicator: Arc<dyn FaultIndicator>,
}

/// Build the driver set for `kind`.
///
/// The sysfs backend still uses the log-only indicator: the status LED is
/// owned by the excluded button subsystem.
pub fn create_drivers(kind: DriverKind, config: &HardwareConfig) -> DriverSet {
    info!("Creating {:?} drivers", kind);
    match kind {
        DriverKind::Simulation => {
            let (servo, emitter, indicator) = simulation::create_drivers();
            DriverSet {
                servo: Box::new(servo),
                emitter: Box::new(emitter),
                indicator,
            }
        }
        DriverKind::Sysfs => DriverSet {
            servo: Box::new(sysfs::SysfsPwmDriver::new(
                &config.pwm_chip,
                config.pan_channel,
                config.tilt_channel,
            )),
            emitter: Box::new(sysfs::SysfsGpioDriver::new(
                &config.gpio_base,
                config.emitter_gpio,
            )),
            indicator: Arc::new(sysfs::LogIndicator),
        },
    }
}
