//! Commanded moves reach the outputs as a sequence of steps.

use turret_common::types::{Axis, ServoPosition};
use turret_control::TurretConfig;
use turret_control::servo::angle_to_pulse_us;

use super::common::Harness;

#[test]
fn one_tick_writes_every_interpolation_step() {
    let mut h = Harness::new();
    h.tick_fed(1);
    let before = h.servo_hw.writes();

    h.turret().servo.move_to(40.0, -25.0).unwrap();
    h.tick_fed(1);

    // Both axes are written on each of the nine steps.
    assert_eq!(h.servo_hw.writes() - before, 18);
    assert!(!h.turret().servo.is_moving());
    assert_eq!(h.turret().servo.position(), ServoPosition::new(40.0, -25.0));
    assert_eq!(h.servo_hw.pulse_us(Axis::Pan), angle_to_pulse_us(Axis::Pan, 40.0));
}

#[test]
fn long_move_spreads_over_several_ticks() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = TurretConfig::default();
    config.calibration.path = dir.path().join("calibration.json");
    config.servo.move_time_ms = 300;
    config.servo.step_ms = 5;
    let mut h = Harness::with_config(config, dir);
    h.tick_fed(1);

    h.turret().servo.move_to(-30.0, -20.0).unwrap();
    for _ in 0..2 {
        let before = h.servo_hw.writes();
        h.tick_fed(1);
        // Twenty 5 ms steps fit in one 100 ms tick.
        assert_eq!(h.servo_hw.writes() - before, 40);
        assert!(h.turret().servo.is_moving());
    }
    h.tick_fed(1);
    assert!(!h.turret().servo.is_moving());
    assert_eq!(h.turret().servo.position(), ServoPosition::new(-30.0, -20.0));
    assert_eq!(h.turret().servo.stats().watchdog_trips, 0);
}
