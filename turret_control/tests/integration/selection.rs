//! Target selection through the engine.

use turret_control::targeting::TargetState;

use super::common::{Harness, detection};

#[test]
fn larger_of_two_candidates_is_tracked() {
    let mut h = Harness::new();
    h.arm();
    // 10x10 = 100 (rejected, not strictly above), 10x11 = 110.
    let at_threshold = detection(100, 300, 10, 10);
    let above = detection(400, 300, 10, 11);
    let info = h
        .turret()
        .targeting
        .process_detections(&[at_threshold, above])
        .unwrap();

    assert_eq!(info.area, 110);
    assert_eq!(info.bbox, above.bbox);
    assert_eq!(h.turret().targeting.stats().multi_target_frames, 0);
}

#[test]
fn detection_at_threshold_is_rejected() {
    let mut h = Harness::new();
    h.arm();
    let info = h
        .turret()
        .targeting
        .process_detections(&[detection(300, 300, 10, 10)]);

    assert!(info.is_none());
    assert_eq!(h.turret().targeting.state(), TargetState::Idle);
    assert!(!h.laser.is_on());
}

#[test]
fn several_candidates_count_as_multi_target() {
    let mut h = Harness::new();
    h.arm();
    let small = detection(100, 300, 20, 20);
    let large = detection(400, 300, 40, 40);
    let info = h
        .turret()
        .targeting
        .process_detections(&[small, large])
        .unwrap();

    assert_eq!(info.area, 1_600);
    assert_eq!(h.turret().targeting.stats().multi_target_frames, 1);
    assert_eq!(h.turret().targeting.stats().targets_acquired, 1);
}
