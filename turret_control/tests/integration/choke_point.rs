//! Every path that lights the emitter goes through the safety checks.
//!
//! The emitter handle on [`Turret`](turret_control::Turret) can only turn
//! the output off; switching it on is left to the safety layer.

use std::time::Duration;

use turret_control::emitter::EmitterState;
use turret_control::safety::{ActivationOutcome, Refusal, SafetyCheck};

use super::common::{Harness, target_below_center};

#[test]
fn armed_turret_without_detection_never_fires() {
    let mut h = Harness::new();
    h.arm();

    let emitter = h.turret().emitter.clone();
    let safety = h.turret().safety.clone();
    for _ in 0..5 {
        let outcome = safety.request_activation();
        match outcome {
            ActivationOutcome::Refused(Refusal::Check(check), _) => {
                assert_eq!(check, SafetyCheck::DETECTION)
            }
            other => panic!("activation without a detection: {other:?}"),
        }
        assert!(!safety.request_activation_for(Duration::from_millis(200)).is_activated());
        emitter.reset_kill_switch();
        emitter.update();
        h.tick_fed(1);
    }

    assert_eq!(h.laser.switch_ons(), 0);
    assert_eq!(emitter.state(), EmitterState::Armed);
}

#[test]
fn emitter_handle_cannot_relight_after_safe_mode() {
    let mut h = Harness::new();
    h.arm();
    h.detect(target_below_center());
    assert!(h.laser.is_on());
    let lit = h.laser.switch_ons();

    h.turret().safety.set_voltage(4000);
    h.tick_fed(1);
    assert!(h.turret().safety.is_safe_mode());
    assert!(!h.laser.is_on());

    let emitter = h.turret().emitter.clone();
    emitter.reset_kill_switch();
    emitter.update();
    assert_eq!(emitter.state(), EmitterState::EmergencyStop);
    assert!(emitter.is_inhibited());

    for _ in 0..3 {
        h.detect(target_below_center());
        h.tick_fed(1);
    }
    assert!(!h.laser.is_on());
    assert_eq!(h.laser.switch_ons(), lit);
}

#[test]
fn operator_kill_switch_outlives_safe_mode_reset() {
    let mut h = Harness::new();
    h.arm();
    h.turret().emitter.kill_switch();

    h.turret().safety.set_voltage(4000);
    h.tick_fed(1);
    assert!(h.turret().safety.is_safe_mode());
    h.turret().safety.set_voltage(5000);
    assert!(h.turret().safety.reset());

    assert!(h.turret().emitter.is_kill_switch_engaged());
    h.arm_input.set_armed(false);
    h.tick_fed(1);
    h.arm_input.set_armed(true);
    h.tick_fed(1);
    h.detect(target_below_center());
    assert!(!h.laser.is_on());
    assert_eq!(h.laser.switch_ons(), 0);

    h.turret().emitter.reset_kill_switch();
    assert_eq!(h.turret().emitter.state(), EmitterState::Off);
}
