//! Shared harness: full core on simulation drivers with a manual clock.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use turret_common::clock::ManualClock;
use turret_common::hal::driver::FaultIndicator;
use turret_common::types::{BoundingBox, Detection};
use turret_control::safety::SharedArmInput;
use turret_control::{CycleRunner, Turret, TurretConfig};
use turret_hal::DriverSet;
use turret_hal::drivers::simulation::{
    SimEmitterDriver, SimEmitterState, SimIndicator, SimServoDriver, SimServoState,
};

pub const TICK_MS: u64 = 100;

pub struct Harness {
    pub runner: CycleRunner,
    pub arm_input: Arc<SharedArmInput>,
    pub clock: Arc<ManualClock>,
    pub laser: Arc<SimEmitterState>,
    pub servo_hw: Arc<SimServoState>,
    pub indicator: Arc<SimIndicator>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TurretConfig::default();
        config.calibration.path = dir.path().join("calibration.json");
        Self::with_config(config, dir)
    }

    pub fn with_config(config: TurretConfig, dir: TempDir) -> Self {
        let clock = Arc::new(ManualClock::new());
        let arm = Arc::new(SharedArmInput::new());

        let servo = SimServoDriver::new();
        let servo_hw = servo.state();
        let emitter = SimEmitterDriver::new();
        let laser = emitter.state();
        let indicator = Arc::new(SimIndicator::new());
        let drivers = DriverSet {
            servo: Box::new(servo),
            emitter: Box::new(emitter),
            indicator: indicator.clone() as Arc<dyn FaultIndicator>,
        };

        let turret = Turret::build(&config, drivers, arm.clone(), clock.clone()).unwrap();
        let runner = CycleRunner::new(turret, Duration::from_millis(TICK_MS), clock.clone());
        Self {
            runner,
            arm_input: arm,
            clock,
            laser,
            servo_hw,
            indicator,
            dir,
        }
    }

    pub fn turret(&self) -> &Turret {
        self.runner.turret()
    }

    /// Advance the clock by one interval and run one tick.
    pub fn tick(&mut self) {
        self.clock.advance_ms(TICK_MS);
        self.runner.tick();
    }

    /// Run `n` ticks, feeding the heartbeat after each one.
    pub fn tick_fed(&mut self, n: u32) {
        for _ in 0..n {
            self.tick();
            self.turret().safety.feed_watchdog();
        }
    }

    /// Raise the arm input and let the tick pick up the edge.
    pub fn arm(&mut self) {
        self.arm_input.set_armed(true);
        self.runner.tick();
        assert!(self.turret().emitter.is_armed());
    }

    pub fn detect(&self, det: Detection) {
        self.turret().targeting.process_detections(&[det]);
    }

    pub fn now_ms(&self) -> u64 {
        use turret_common::clock::Clock;
        self.clock.now().as_millis() as u64
    }
}

pub fn detection(x: i32, y: i32, width: u32, height: u32) -> Detection {
    Detection::new(BoundingBox::new(x, y, width, height), 0.9)
}

/// 10x15 box centred on (320, 360): pan 0, tilt -11.25 under identity.
pub fn target_below_center() -> Detection {
    detection(315, 353, 10, 15)
}
