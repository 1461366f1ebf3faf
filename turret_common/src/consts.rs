//! System-wide constants for the turret workspace.
//!
//! Single source of truth for actuator limits, timing defaults and paths.
//! Configuration defaults are taken from here; no duplication permitted.

use static_assertions::const_assert;

// ─── Actuator Geometry ──────────────────────────────────────────────

/// Pan lower limit [deg].
pub const PAN_MIN_DEG: f32 = -45.0;
/// Pan upper limit [deg].
pub const PAN_MAX_DEG: f32 = 45.0;
/// Pan center / home [deg].
pub const PAN_CENTER_DEG: f32 = 0.0;

/// Tilt lower limit [deg] (pointing down).
pub const TILT_MIN_DEG: f32 = -30.0;
/// Tilt upper limit [deg]. Never point above horizontal.
pub const TILT_MAX_DEG: f32 = 0.0;
/// Tilt home [deg], halfway down the allowed range.
pub const TILT_HOME_DEG: f32 = -15.0;

/// Tolerance used when comparing angles against limits [deg].
pub const ANGLE_EPSILON_DEG: f32 = 0.01;

// ─── Servo PWM ──────────────────────────────────────────────────────

/// Pulse width at the negative end of an axis range [µs].
pub const PULSE_MIN_US: u32 = 1000;
/// Pulse width at the positive end of an axis range [µs].
pub const PULSE_MAX_US: u32 = 2000;
/// Pulse width at the axis center [µs].
pub const PULSE_CENTER_US: u32 = 1500;
/// PWM frequency [Hz].
pub const PWM_FREQUENCY_HZ: u32 = 50;
/// PWM period [µs].
pub const PWM_PERIOD_US: u32 = 1_000_000 / PWM_FREQUENCY_HZ;

// ─── Actuator Motion ────────────────────────────────────────────────

/// Total duration of one interpolated move [ms].
pub const MOVE_TIME_MS: u64 = 45;
/// Interpolation step size [ms].
pub const INTERPOLATION_STEP_MS: u64 = 5;
/// A move is overdue once it exceeds `MOVE_TIME_MS * MOVE_TIMEOUT_FACTOR`.
pub const MOVE_TIMEOUT_FACTOR: u64 = 4;
/// Consecutive overdue ticks before the actuator is declared failed.
pub const SERVO_FAILURE_THRESHOLD: u32 = 3;

// ─── Emitter ────────────────────────────────────────────────────────

/// Maximum continuous emitter on-time [ms].
pub const EMITTER_MAX_ON_MS: u64 = 10_000;
/// Mandatory cooldown after deactivation [ms].
pub const EMITTER_COOLDOWN_MS: u64 = 5_000;

// ─── Targeting ──────────────────────────────────────────────────────

/// Minimum bounding-box area [px²]; candidates must be strictly larger.
pub const TARGET_MIN_AREA: u32 = 100;
/// Target is lost when not re-observed within this window [ms].
pub const TARGET_LOST_TIMEOUT_MS: u64 = 500;
/// Sweep amplitude on the pan axis [deg].
pub const SWEEP_AMPLITUDE_DEG: f32 = 10.0;
/// Sweep frequency [Hz].
pub const SWEEP_FREQUENCY_HZ: f32 = 2.0;
/// Largest accepted sweep amplitude [deg].
pub const SWEEP_AMPLITUDE_MAX_DEG: f32 = 45.0;
/// Accepted sweep frequency range [Hz].
pub const SWEEP_FREQUENCY_MIN_HZ: f32 = 0.5;
pub const SWEEP_FREQUENCY_MAX_HZ: f32 = 5.0;

// ─── Safety ─────────────────────────────────────────────────────────

/// Heartbeat gap that forces safe mode [ms].
pub const WATCHDOG_TIMEOUT_MS: u64 = 30_000;
/// Heartbeat gap that raises a warning [ms].
pub const WATCHDOG_WARNING_MS: u64 = 25_000;
/// Supply voltage below which safe mode is forced [mV].
pub const BROWNOUT_THRESHOLD_MV: u32 = 4_500;
/// Supply voltage below which a warning is raised [mV].
pub const VOLTAGE_WARNING_MV: u32 = 4_750;
/// Nominal supply voltage assumed until the first reading [mV].
pub const NOMINAL_VOLTAGE_MV: u32 = 5_000;
/// The safety layer turns the emitter off this long before the emitter's own limit [ms].
pub const AUTO_OFF_MARGIN_MS: u64 = 500;

// ─── Camera ─────────────────────────────────────────────────────────

pub const DEFAULT_CAMERA_WIDTH: u32 = 640;
pub const DEFAULT_CAMERA_HEIGHT: u32 = 480;
pub const DEFAULT_FOV_H_DEG: f32 = 60.0;
pub const DEFAULT_FOV_V_DEG: f32 = 45.0;

/// Calibration scales with a magnitude below this are replaced by 1.0.
pub const MIN_SCALE_MAGNITUDE: f32 = 1e-4;
/// Maximum calibration points kept per procedure.
pub const MAX_CALIBRATION_POINTS: usize = 4;

// ─── Runner / Paths ─────────────────────────────────────────────────

/// Supervisory tick interval [ms].
pub const TICK_INTERVAL_MS: u64 = 100;

/// Default calibration record path.
pub const DEFAULT_CALIBRATION_PATH: &str = "/data/turret/calibration.json";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/turret/turret.toml";

const_assert!(WATCHDOG_WARNING_MS < WATCHDOG_TIMEOUT_MS);
const_assert!(BROWNOUT_THRESHOLD_MV < VOLTAGE_WARNING_MV);
const_assert!(AUTO_OFF_MARGIN_MS < EMITTER_MAX_ON_MS);
const_assert!(INTERPOLATION_STEP_MS <= MOVE_TIME_MS);
const_assert!(PULSE_MIN_US < PULSE_CENTER_US && PULSE_CENTER_US < PULSE_MAX_US);
