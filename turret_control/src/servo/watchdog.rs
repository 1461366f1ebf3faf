//! Movement watchdog.
//!
//! Hobby servos report nothing back, so failure is inferred: a commanded
//! move that has made no progress for longer than `move_time * factor` is
//! overdue, and enough consecutive overdue ticks trip the actuator fault.
//! A jammed horn whose output writes still succeed is not detected.

/// Result of one watchdog evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogResult {
    /// Motion is overdue this tick.
    pub overdue: bool,
    /// Updated consecutive overdue count.
    pub consecutive_failures: u32,
    /// Threshold reached; declare the actuator failed.
    pub trip: bool,
}

/// Evaluate the movement watchdog for one tick.
///
/// # Arguments
/// - `moving`: a commanded move is still in flight.
/// - `since_progress_ms`: time since the move started or last advanced.
/// - `timeout_ms`: overdue threshold. Zero disables the watchdog.
/// - `consecutive_failures`: count carried from the previous tick.
/// - `threshold`: count that trips the fault.
pub fn evaluate_motion(
    moving: bool,
    since_progress_ms: u64,
    timeout_ms: u64,
    consecutive_failures: u32,
    threshold: u32,
) -> WatchdogResult {
    if !moving || timeout_ms == 0 || since_progress_ms <= timeout_ms {
        return WatchdogResult {
            overdue: false,
            consecutive_failures,
            trip: false,
        };
    }

    let count = consecutive_failures.saturating_add(1);
    WatchdogResult {
        overdue: true,
        consecutive_failures: count,
        trip: count >= threshold,
    }
}
