//! Safety check flags and the per-attempt snapshot.
//!
//! A snapshot answers "why didn't it fire" on its own: the five check
//! results, the safe-mode flag with its cause, and the readings the checks
//! were judged on.

use bitflags::bitflags;
use std::fmt;
use std::time::Duration;

bitflags! {
    /// Failed activation checks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SafetyCheck: u8 {
        /// Arm input is not armed.
        const ARMED           = 0x01;
        /// No target is being tracked.
        const DETECTION       = 0x02;
        /// Actual tilt is above the upward limit.
        const TILT            = 0x04;
        /// Continuous on-time at or past the limit.
        const CONTINUOUS_TIME = 0x08;
        /// Kill switch latched.
        const KILL_SWITCH     = 0x10;
    }
}

impl Default for SafetyCheck {
    fn default() -> Self {
        Self::empty()
    }
}

impl SafetyCheck {
    /// Display names, in check order.
    pub const NAMES: [(SafetyCheck, &'static str); 5] = [
        (SafetyCheck::ARMED, "armed"),
        (SafetyCheck::DETECTION, "detection"),
        (SafetyCheck::TILT, "tilt"),
        (SafetyCheck::CONTINUOUS_TIME, "continuous_time"),
        (SafetyCheck::KILL_SWITCH, "kill_switch"),
    ];

    /// Index into per-check counters.
    pub fn index(self) -> Option<usize> {
        Self::NAMES.iter().position(|(flag, _)| *flag == self)
    }
}

impl fmt::Display for SafetyCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Why safe mode was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SafeModeCause {
    #[default]
    None,
    /// Heartbeat absent for the watchdog timeout.
    Watchdog,
    /// Supply voltage below the brownout threshold.
    Brownout,
    /// Emergency stop from the arm input or an operator command.
    ManualEStop,
}

impl SafeModeCause {
    pub const fn name(self) -> &'static str {
        match self {
            SafeModeCause::None => "none",
            SafeModeCause::Watchdog => "watchdog",
            SafeModeCause::Brownout => "brownout",
            SafeModeCause::ManualEStop => "manual_estop",
        }
    }
}

/// Summary of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    SafeMode(SafeModeCause),
    /// Exactly one check failed.
    Failed(SafetyCheck),
    /// More than one check failed.
    Multiple(SafetyCheck),
}

/// Result of the most recent safety evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetySnapshot {
    pub failed: SafetyCheck,
    pub safe_mode: bool,
    pub cause: SafeModeCause,
    /// Actual tilt read from the actuator [deg].
    pub tilt_deg: f32,
    pub continuous_on: Duration,
    pub watchdog_remaining: Duration,
    pub voltage_mv: u32,
    /// Clock reading when evaluated.
    pub at: Duration,
}

impl Default for SafetySnapshot {
    fn default() -> Self {
        Self {
            failed: SafetyCheck::empty(),
            safe_mode: false,
            cause: SafeModeCause::None,
            tilt_deg: 0.0,
            continuous_on: Duration::ZERO,
            watchdog_remaining: Duration::ZERO,
            voltage_mv: 0,
            at: Duration::ZERO,
        }
    }
}

impl SafetySnapshot {
    #[inline]
    pub const fn armed(&self) -> bool {
        !self.failed.contains(SafetyCheck::ARMED)
    }

    #[inline]
    pub const fn has_detection(&self) -> bool {
        !self.failed.contains(SafetyCheck::DETECTION)
    }

    #[inline]
    pub const fn tilt_ok(&self) -> bool {
        !self.failed.contains(SafetyCheck::TILT)
    }

    #[inline]
    pub const fn continuous_time_ok(&self) -> bool {
        !self.failed.contains(SafetyCheck::CONTINUOUS_TIME)
    }

    #[inline]
    pub const fn kill_switch_clear(&self) -> bool {
        !self.failed.contains(SafetyCheck::KILL_SWITCH)
    }

    /// All checks passed and not in safe mode.
    #[inline]
    pub const fn passed(&self) -> bool {
        self.failed.is_empty() && !self.safe_mode
    }

    pub fn verdict(&self) -> Verdict {
        if self.safe_mode {
            Verdict::SafeMode(self.cause)
        } else if self.failed.is_empty() {
            Verdict::Pass
        } else if self.failed.bits().count_ones() == 1 {
            Verdict::Failed(self.failed)
        } else {
            Verdict::Multiple(self.failed)
        }
    }
}
