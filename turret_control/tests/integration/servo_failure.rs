//! Actuator watchdog trip disables the emitter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use turret_common::types::Axis;
use turret_control::servo::ServoError;

use super::common::{Harness, target_below_center};

#[test]
fn stalled_actuator_disables_emitter() {
    let mut h = Harness::new();
    let failures = Arc::new(AtomicU32::new(0));
    let seen = failures.clone();
    h.turret()
        .servo
        .set_failure_callback(Some(Arc::new(move |axis: Axis| {
            assert_eq!(axis, Axis::Pan);
            seen.fetch_add(1, Ordering::SeqCst);
        })));

    h.arm();
    h.servo_hw.set_failing(true);
    h.detect(target_below_center());
    assert!(h.laser.is_on());

    // 180 ms overdue window, three consecutive overdue ticks.
    for _ in 0..3 {
        h.tick();
        assert!(h.turret().servo.is_hardware_ok());
    }
    h.tick();

    assert!(!h.turret().servo.is_hardware_ok());
    assert!(!h.laser.is_on());
    assert!(!h.turret().emitter.is_armed());
    assert!(h.indicator.is_fault());
    assert_eq!(failures.load(Ordering::SeqCst), 1);

    // Further engagement cannot move or fire.
    assert_eq!(
        h.turret().servo.move_to(0.0, -10.0),
        Err(ServoError::HardwareFault(Axis::Pan))
    );
    h.detect(target_below_center());
    assert!(!h.laser.is_on());
    h.tick();
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[test]
fn cleared_fault_restores_motion() {
    let mut h = Harness::new();
    h.servo_hw.set_failing(true);
    h.turret().servo.move_to(10.0, -10.0).unwrap();
    for _ in 0..4 {
        h.tick();
    }
    assert!(!h.turret().servo.is_hardware_ok());

    h.servo_hw.set_failing(false);
    h.turret().servo.clear_fault();
    assert!(!h.indicator.is_fault());
    h.turret().servo.move_to(10.0, -10.0).unwrap();
    h.tick();
    assert!(!h.turret().servo.is_moving());
    assert!((h.servo_hw.pulse_us(Axis::Pan) as i32 - 1611).abs() <= 1);
}
