//! Detection → track → fire → loss → stand down.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use turret_common::types::{PixelCoord, ServoPosition};
use turret_control::emitter::EmitterState;
use turret_control::targeting::TargetState;

use super::common::{Harness, target_below_center};

#[test]
fn detection_tracks_fires_then_stands_down_on_loss() {
    let mut h = Harness::new();
    let lost = Arc::new(Mutex::new(Vec::new()));
    let sink = lost.clone();
    h.turret()
        .targeting
        .set_lost_callback(Some(Arc::new(move |tracked: Duration| {
            sink.lock().push(tracked);
        })));

    h.arm();
    let start = h.now_ms();
    h.detect(target_below_center());

    assert_eq!(h.turret().targeting.state(), TargetState::Tracking);
    let target = h.turret().targeting.target().unwrap();
    assert_eq!(target.area, 150);
    assert_eq!(target.centroid, PixelCoord::new(320, 360));
    let aim = h.turret().servo.target();
    assert!(aim.pan_deg.abs() < 0.01);
    assert!((aim.tilt_deg + 11.25).abs() < 0.01);
    assert!(h.laser.is_on());
    assert_eq!(h.turret().emitter.state(), EmitterState::Active);

    // Tilt is held while the pan sweeps.
    h.tick();
    let swept = h.turret().servo.position();
    assert!((swept.tilt_deg + 11.25).abs() < 0.01);

    for _ in 0..3 {
        h.tick();
        assert!(h.laser.is_on());
    }
    h.tick();
    assert_eq!(h.now_ms() - start, 500);

    assert_eq!(h.turret().targeting.state(), TargetState::Idle);
    assert!(!h.laser.is_on());
    assert_eq!(h.turret().servo.target(), ServoPosition::home());
    assert_eq!(*lost.lock(), vec![Duration::from_millis(500)]);

    h.tick();
    assert_eq!(h.turret().servo.position(), ServoPosition::home());
}

#[test]
fn disarmed_turret_tracks_but_never_fires() {
    let mut h = Harness::new();
    h.detect(target_below_center());
    assert!(h.turret().targeting.is_tracking());
    for _ in 0..3 {
        h.tick();
        h.detect(target_below_center());
    }
    assert!(!h.laser.is_on());
    assert_eq!(h.laser.switch_ons(), 0);

    let snapshot = h.turret().safety.snapshot();
    assert!(!snapshot.armed());
    assert!(snapshot.has_detection());
    assert!(snapshot.kill_switch_clear());
}

#[test]
fn continuous_tracking_respects_on_time_and_cooldown() {
    let mut h = Harness::new();
    h.arm();
    h.detect(target_below_center());
    assert!(h.laser.is_on());

    // Keep the target in view for 12 s.
    let mut longest_on = 0u64;
    let mut on_since = Some(h.now_ms());
    for _ in 0..120 {
        h.tick();
        h.turret().safety.feed_watchdog();
        h.detect(target_below_center());
        match (h.laser.is_on(), on_since) {
            (true, None) => on_since = Some(h.now_ms()),
            (false, Some(t)) => {
                longest_on = longest_on.max(h.now_ms() - t);
                on_since = None;
            }
            _ => {}
        }
    }

    assert!(longest_on <= 10_000, "continuous on {longest_on} ms");
    let stats = h.turret().emitter.stats();
    assert!(stats.cooldown_block_count > 0);
    assert!(h.turret().safety.stats().auto_offs >= 1);
}

#[test]
fn cancel_stops_engagement() {
    let mut h = Harness::new();
    h.arm();
    h.detect(target_below_center());
    assert!(h.laser.is_on());

    assert!(h.turret().targeting.cancel());
    assert!(!h.laser.is_on());
    assert_eq!(h.turret().targeting.state(), TargetState::Idle);
    assert_eq!(h.turret().servo.target(), ServoPosition::home());
}
