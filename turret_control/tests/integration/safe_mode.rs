//! Watchdog, brownout and emergency stop drive the core into safe mode.

use turret_control::emitter::EmitterState;
use turret_control::safety::{ActivationOutcome, Refusal, SafeModeCause, SafetyLevel};

use super::common::{Harness, target_below_center};

#[test]
fn missing_heartbeat_forces_safe_mode_while_firing() {
    let mut h = Harness::new();
    h.arm();
    h.detect(target_below_center());

    // Target stays in view, nobody feeds the heartbeat.
    while h.now_ms() < 29_900 {
        h.tick();
        h.detect(target_below_center());
    }
    assert!(h.laser.is_on(), "emitter should be on just before the timeout");
    assert_eq!(h.turret().safety.level(), SafetyLevel::Warning);

    h.tick();
    assert_eq!(h.now_ms(), 30_000);
    assert!(!h.laser.is_on());
    assert!(h.turret().safety.is_safe_mode());
    assert_eq!(h.turret().safety.safe_mode_cause(), SafeModeCause::Watchdog);
    assert_eq!(h.turret().emitter.state(), EmitterState::EmergencyStop);

    let outcome = h.turret().safety.request_activation();
    assert!(matches!(
        outcome,
        ActivationOutcome::Refused(Refusal::SafeMode(SafeModeCause::Watchdog), _)
    ));
    h.detect(target_below_center());
    assert!(!h.laser.is_on());
    let snapshot = h.turret().safety.snapshot();
    assert!(snapshot.safe_mode);
    assert_eq!(snapshot.cause, SafeModeCause::Watchdog);
}

#[test]
fn reset_requires_operator_rearm() {
    let mut h = Harness::new();
    h.arm();
    while h.now_ms() < 30_000 {
        h.tick();
    }
    assert!(h.turret().safety.is_safe_mode());

    assert!(h.turret().safety.reset());
    assert!(!h.turret().safety.is_safe_mode());
    assert!(!h.turret().emitter.is_armed());

    h.tick_fed(2);
    h.detect(target_below_center());
    assert!(!h.laser.is_on());
    assert!(!h.turret().emitter.is_armed());

    // Operator cycles the arm input.
    h.arm_input.set_armed(false);
    h.tick_fed(1);
    h.arm();
    h.detect(target_below_center());
    assert!(h.laser.is_on());
}

#[test]
fn brownout_forces_safe_mode() {
    let mut h = Harness::new();
    h.arm();
    h.detect(target_below_center());
    assert!(h.laser.is_on());

    h.turret().safety.set_voltage(4_700);
    assert_eq!(h.turret().safety.level(), SafetyLevel::Warning);
    assert!(h.laser.is_on());

    h.turret().safety.set_voltage(4_300);
    assert!(!h.laser.is_on());
    assert_eq!(h.turret().safety.safe_mode_cause(), SafeModeCause::Brownout);

    // Voltage recovering does not clear the latch.
    h.turret().safety.set_voltage(5_000);
    h.tick_fed(1);
    assert!(h.turret().safety.is_safe_mode());
}

#[test]
fn emergency_stop_input_latches() {
    let mut h = Harness::new();
    h.arm();
    h.detect(target_below_center());
    assert!(h.laser.is_on());

    h.arm_input.trigger_emergency_stop();
    h.tick();
    assert!(!h.laser.is_on());
    assert_eq!(h.turret().safety.level(), SafetyLevel::Emergency);
    assert_eq!(h.turret().safety.safe_mode_cause(), SafeModeCause::ManualEStop);

    assert!(h.turret().safety.reset());
    h.tick_fed(1);
    assert!(!h.turret().safety.is_safe_mode());
}
