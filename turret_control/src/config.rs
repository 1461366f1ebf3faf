//! TOML configuration for the turret control core.
//!
//! One file, one table per component. Every field has a default equal to
//! the constant in `turret_common::consts`, so an empty file is valid.
//! Limits can be tightened, never widened past the compiled-in ceilings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use turret_common::config::{ConfigError, ConfigLoader, SharedConfig};
use turret_common::consts::*;
use turret_common::types::CameraParams;
use turret_hal::HardwareConfig;

// ─── Bounds ─────────────────────────────────────────────────────────

const TICK_INTERVAL_MS_MIN: u64 = 5;
const TICK_INTERVAL_MS_MAX: u64 = 1_000;
const EMITTER_COOLDOWN_MS_MIN: u64 = 1_000;
const LOST_TIMEOUT_MS_MIN: u64 = 100;
const LOST_TIMEOUT_MS_MAX: u64 = 10_000;
const WATCHDOG_TIMEOUT_MS_MIN: u64 = 1_000;

// ─── Sections ───────────────────────────────────────────────────────

/// `[calibration]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default = "default_calibration_path")]
    pub path: PathBuf,
}

fn default_calibration_path() -> PathBuf {
    PathBuf::from(DEFAULT_CALIBRATION_PATH)
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            path: default_calibration_path(),
        }
    }
}

/// `[servo]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    /// Duration of one interpolated move [ms].
    pub move_time_ms: u64,
    /// Interpolation step [ms].
    pub step_ms: u64,
    /// A move is overdue after `move_time_ms * timeout_factor`.
    pub timeout_factor: u64,
    /// Consecutive overdue ticks that trip the actuator fault.
    pub failure_threshold: u32,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            move_time_ms: MOVE_TIME_MS,
            step_ms: INTERPOLATION_STEP_MS,
            timeout_factor: MOVE_TIMEOUT_FACTOR,
            failure_threshold: SERVO_FAILURE_THRESHOLD,
        }
    }
}

impl ServoConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.step_ms == 0 || self.move_time_ms < self.step_ms {
            return Err(format!(
                "step_ms {} must be in [1, move_time_ms={}]",
                self.step_ms, self.move_time_ms
            ));
        }
        if self.timeout_factor < 2 {
            return Err(format!("timeout_factor {} must be >= 2", self.timeout_factor));
        }
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be >= 1".to_string());
        }
        Ok(())
    }

    /// Number of interpolation steps per move.
    #[inline]
    pub fn steps(&self) -> u32 {
        (self.move_time_ms / self.step_ms.max(1)).max(1) as u32
    }
}

/// `[emitter]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Maximum continuous on-time [ms]; at most `EMITTER_MAX_ON_MS`.
    pub max_on_ms: u64,
    /// Cooldown after every deactivation [ms].
    pub cooldown_ms: u64,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            max_on_ms: EMITTER_MAX_ON_MS,
            cooldown_ms: EMITTER_COOLDOWN_MS,
        }
    }
}

impl EmitterConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_on_ms <= AUTO_OFF_MARGIN_MS || self.max_on_ms > EMITTER_MAX_ON_MS {
            return Err(format!(
                "max_on_ms {} out of range ({}, {}]",
                self.max_on_ms, AUTO_OFF_MARGIN_MS, EMITTER_MAX_ON_MS
            ));
        }
        if self.cooldown_ms < EMITTER_COOLDOWN_MS_MIN {
            return Err(format!(
                "cooldown_ms {} below minimum {}",
                self.cooldown_ms, EMITTER_COOLDOWN_MS_MIN
            ));
        }
        Ok(())
    }
}

/// `[targeting]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingConfig {
    /// Candidates must have an area strictly greater than this [px²].
    pub min_area: u32,
    pub lost_timeout_ms: u64,
    pub sweep_amplitude_deg: f32,
    pub sweep_frequency_hz: f32,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            min_area: TARGET_MIN_AREA,
            lost_timeout_ms: TARGET_LOST_TIMEOUT_MS,
            sweep_amplitude_deg: SWEEP_AMPLITUDE_DEG,
            sweep_frequency_hz: SWEEP_FREQUENCY_HZ,
        }
    }
}

impl TargetingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(LOST_TIMEOUT_MS_MIN..=LOST_TIMEOUT_MS_MAX).contains(&self.lost_timeout_ms) {
            return Err(format!(
                "lost_timeout_ms {} out of range [{}, {}]",
                self.lost_timeout_ms, LOST_TIMEOUT_MS_MIN, LOST_TIMEOUT_MS_MAX
            ));
        }
        if !(0.0..=SWEEP_AMPLITUDE_MAX_DEG).contains(&self.sweep_amplitude_deg) {
            return Err(format!(
                "sweep_amplitude_deg {} out of range [0, {}]",
                self.sweep_amplitude_deg, SWEEP_AMPLITUDE_MAX_DEG
            ));
        }
        if !(SWEEP_FREQUENCY_MIN_HZ..=SWEEP_FREQUENCY_MAX_HZ).contains(&self.sweep_frequency_hz) {
            return Err(format!(
                "sweep_frequency_hz {} out of range [{}, {}]",
                self.sweep_frequency_hz, SWEEP_FREQUENCY_MIN_HZ, SWEEP_FREQUENCY_MAX_HZ
            ));
        }
        Ok(())
    }
}

/// `[safety]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub watchdog_timeout_ms: u64,
    pub watchdog_warning_ms: u64,
    pub brownout_mv: u32,
    pub voltage_warning_mv: u32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout_ms: WATCHDOG_TIMEOUT_MS,
            watchdog_warning_ms: WATCHDOG_WARNING_MS,
            brownout_mv: BROWNOUT_THRESHOLD_MV,
            voltage_warning_mv: VOLTAGE_WARNING_MV,
        }
    }
}

impl SafetyConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.watchdog_timeout_ms < WATCHDOG_TIMEOUT_MS_MIN
            || self.watchdog_timeout_ms > WATCHDOG_TIMEOUT_MS
        {
            return Err(format!(
                "watchdog_timeout_ms {} out of range [{}, {}]",
                self.watchdog_timeout_ms, WATCHDOG_TIMEOUT_MS_MIN, WATCHDOG_TIMEOUT_MS
            ));
        }
        if self.watchdog_warning_ms >= self.watchdog_timeout_ms {
            return Err(format!(
                "watchdog_warning_ms {} must be below watchdog_timeout_ms {}",
                self.watchdog_warning_ms, self.watchdog_timeout_ms
            ));
        }
        if self.brownout_mv >= self.voltage_warning_mv {
            return Err(format!(
                "brownout_mv {} must be below voltage_warning_mv {}",
                self.brownout_mv, self.voltage_warning_mv
            ));
        }
        Ok(())
    }
}

/// `[runner]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub tick_interval_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: TICK_INTERVAL_MS,
        }
    }
}

// ─── Top Level ──────────────────────────────────────────────────────

/// Complete turret configuration.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "turret-north-01"
///
/// [camera]
/// width = 1280
/// height = 720
///
/// [targeting]
/// sweep_amplitude_deg = 6.0
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TurretConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub camera: CameraParams,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub servo: ServoConfig,
    #[serde(default)]
    pub emitter: EmitterConfig,
    #[serde(default)]
    pub targeting: TargetingConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
}

impl TurretConfig {
    /// Run every section's validation, prefixing errors with the table name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let err = |section: &str, e: String| ConfigError::ValidationError(format!("[{section}] {e}"));

        self.shared.validate()?;
        self.hardware.validate().map_err(|e| err("hardware", e))?;
        self.camera.validate().map_err(|e| err("camera", e))?;
        self.servo.validate().map_err(|e| err("servo", e))?;
        self.emitter.validate().map_err(|e| err("emitter", e))?;
        self.targeting.validate().map_err(|e| err("targeting", e))?;
        self.safety.validate().map_err(|e| err("safety", e))?;

        let tick = self.runner.tick_interval_ms;
        if !(TICK_INTERVAL_MS_MIN..=TICK_INTERVAL_MS_MAX).contains(&tick) {
            return Err(err(
                "runner",
                format!(
                    "tick_interval_ms {tick} out of range [{TICK_INTERVAL_MS_MIN}, {TICK_INTERVAL_MS_MAX}]"
                ),
            ));
        }
        if tick >= self.targeting.lost_timeout_ms {
            return Err(err(
                "runner",
                format!(
                    "tick_interval_ms {tick} must be shorter than lost_timeout_ms {}",
                    self.targeting.lost_timeout_ms
                ),
            ));
        }
        Ok(())
    }

    /// Load from `path` and validate.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}
