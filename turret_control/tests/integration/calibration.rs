//! Calibration persists across restarts.

use turret_common::types::{PixelCoord, ServoPosition};
use turret_control::TurretConfig;
use turret_control::mapper::MapOutcome;

use super::common::Harness;

#[test]
fn calibration_survives_restart() {
    let h = Harness::new();
    let mapper = &h.turret().mapper;
    assert!(!mapper.is_calibrated());

    // Frame centre seen when the actuator pointed 2 deg right, 3 deg down.
    mapper
        .add_point(PixelCoord::new(320, 240), ServoPosition::new(2.0, -3.0))
        .unwrap();
    let cal = mapper.compute_calibration().unwrap();
    assert!((cal.offset_pan_deg - 2.0).abs() < 1e-4);
    assert!((cal.offset_tilt_deg + 3.0).abs() < 1e-4);

    let path = h.dir.path().join("calibration.json");
    assert!(path.exists());

    let mut config = TurretConfig::default();
    config.calibration.path = path;
    let Harness { dir, .. } = h;
    let restarted = Harness::with_config(config, dir);
    let mapper = &restarted.turret().mapper;
    assert!(mapper.is_calibrated());

    let mapped = mapper.pixel_to_angle(PixelCoord::new(320, 240));
    assert_eq!(mapped.outcome, MapOutcome::InBounds);
    assert!((mapped.position.pan_deg - 2.0).abs() < 1e-4);
    assert!((mapped.position.tilt_deg + 3.0).abs() < 1e-4);
}

#[test]
fn corrupt_calibration_falls_back_to_identity() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    std::fs::write(&path, "{ not json").unwrap();

    let mut config = TurretConfig::default();
    config.calibration.path = path;
    let h = Harness::with_config(config, dir);

    let mapper = &h.turret().mapper;
    assert!(!mapper.is_calibrated());
    let mapped = mapper.pixel_to_angle(PixelCoord::new(320, 240));
    assert!(mapped.position.pan_deg.abs() < 1e-4);
}

#[test]
fn round_trip_every_in_frame_pixel_row() {
    let h = Harness::new();
    let mapper = &h.turret().mapper;
    for y in (0..480).step_by(7) {
        for x in (0..640).step_by(13) {
            let p = PixelCoord::new(x, y);
            assert_eq!(mapper.angle_to_pixel(mapper.pixel_to_angle(p).position), p);
        }
    }
}
