//! # Turret Control
//!
//! Supervisory process for the pan/tilt emitter turret. Loads the TOML
//! configuration, creates the drivers (sysfs or simulation), assembles the
//! control core and runs the fixed-interval tick until SIGINT/SIGTERM.
//!
//! Detections and the arm input come from separate subsystems. Without
//! them the emitter stays disarmed and the loop only supervises.

use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;
use turret_common::clock::{Clock, MonotonicClock};
use turret_common::config::{ConfigError, LogLevel};
use turret_common::consts::DEFAULT_CONFIG_PATH;
use turret_control::safety::{SafetyLevel, SharedArmInput};
use turret_control::{CycleRunner, Turret, TurretConfig};
use turret_hal::{DriverKind, create_drivers};

/// Turret Control: safety-interlocked pan/tilt emitter controller
#[derive(Parser, Debug)]
#[command(name = "turret_control")]
#[command(version)]
#[command(about = "Safety-interlocked targeting core for a pan/tilt emitter turret")]
struct Args {
    /// Path to the turret configuration TOML.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Use simulation drivers regardless of `[hardware] driver`.
    #[arg(long)]
    simulate: bool,

    /// Run the actuator self-test before entering the loop.
    #[arg(long)]
    self_test: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    // The log level lives in the config, so load before the subscriber exists.
    let loaded = TurretConfig::load_validated(&args.config);
    let level = loaded
        .as_ref()
        .map_or(LogLevel::default(), |c| c.shared.log_level);
    setup_tracing(&args, level);

    info!("Turret Control v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(config) => {
            info!("Config loaded from {}", args.config.display());
            config
        }
        Err(ConfigError::FileNotFound) => {
            warn!(
                "No config at {}, using built-in defaults",
                args.config.display()
            );
            TurretConfig::default()
        }
        Err(e) => {
            error!("FATAL: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run(&args, config) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Turret Control shutdown complete");
}

fn run(args: &Args, config: TurretConfig) -> Result<(), Box<dyn std::error::Error>> {
    let kind = if args.simulate {
        DriverKind::Simulation
    } else {
        config.hardware.driver
    };
    let drivers = create_drivers(kind, &config.hardware);

    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let arm = Arc::new(SharedArmInput::new());
    let turret = Turret::build(&config, drivers, arm, clock.clone())?;

    turret
        .targeting
        .set_lost_callback(Some(Arc::new(|tracked: Duration| {
            info!("Engagement ended after {} ms", tracked.as_millis());
        })));
    turret
        .safety
        .set_level_callback(Some(Arc::new(|old: SafetyLevel, new: SafetyLevel| {
            info!("Safety level {} -> {}", old.name(), new.name());
        })));

    if args.self_test {
        turret.servo.self_test()?;
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let interval = Duration::from_millis(config.runner.tick_interval_ms);
    let mut runner = CycleRunner::new(turret, interval, clock);
    runner.run(&running);

    let stats = *runner.stats();
    info!(
        "Ran {} ticks (avg {} us, max {} us, {} overruns)",
        stats.tick_count,
        stats.avg_tick().as_micros(),
        stats.max_tick.as_micros(),
        stats.overruns
    );
    runner.shutdown();
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
