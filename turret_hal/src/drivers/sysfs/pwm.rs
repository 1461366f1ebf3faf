use super::write_attr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use turret_common::consts::{PULSE_CENTER_US, PWM_PERIOD_US};
use turret_common::prelude::*;

/// Servo output through `/sys/class/pwm/pwmchipN`.
///
/// Period and duty cycle are written in nanoseconds.
#[derive(Debug)]
pub struct SysfsPwmDriver {
    chip: PathBuf,
    pan_channel: u32,
    tilt_channel: u32,
    mock: bool,
}

impl SysfsPwmDriver {
    pub fn new(chip: &Path, pan_channel: u32, tilt_channel: u32) -> Self {
        Self {
            chip: chip.to_path_buf(),
            pan_channel,
            tilt_channel,
            mock: false,
        }
    }

    /// Whether writes are only logged.
    pub fn is_mock(&self) -> bool {
        self.mock
    }

    fn channel(&self, axis: Axis) -> u32 {
        match axis {
            Axis::Pan => self.pan_channel,
            Axis::Tilt => self.tilt_channel,
        }
    }

    fn channel_dir(&self, channel: u32) -> PathBuf {
        self.chip.join(format!("pwm{channel}"))
    }

    fn export(&self, channel: u32) -> std::io::Result<()> {
        if self.channel_dir(channel).exists() {
            return Ok(());
        }
        write_attr(&self.chip.join("export"), channel)
    }

    fn configure(&self, channel: u32) -> std::io::Result<()> {
        let dir = self.channel_dir(channel);
        write_attr(&dir.join("period"), PWM_PERIOD_US as u64 * 1000)?;
        write_attr(&dir.join("duty_cycle"), PULSE_CENTER_US as u64 * 1000)?;
        write_attr(&dir.join("enable"), 1)
    }
}

impl ServoDriver for SysfsPwmDriver {
    fn name(&self) -> &'static str {
        "sysfs-pwm"
    }

    fn init(&mut self) -> Result<(), HalError> {
        if !self.chip.exists() {
            warn!(
                "PWM chip {:?} not present - running servo outputs in mock mode",
                self.chip
            );
            self.mock = true;
            return Ok(());
        }

        let result = [self.pan_channel, self.tilt_channel]
            .into_iter()
            .try_for_each(|ch| self.export(ch).and_then(|_| self.configure(ch)));

        match result {
            Ok(()) => {
                self.mock = false;
                info!(
                    "PWM initialized on {:?} - channels {} (pan), {} (tilt)",
                    self.chip, self.pan_channel, self.tilt_channel
                );
            }
            Err(e) => {
                warn!("PWM sysfs setup failed ({e}) - running servo outputs in mock mode");
                self.mock = true;
            }
        }
        Ok(())
    }

    fn set_pulse_us(&mut self, axis: Axis, pulse_us: u32) -> Result<(), HalError> {
        if self.mock {
            debug!("PWM (mock): {} = {} us", axis, pulse_us);
            return Ok(());
        }
        let path = self.channel_dir(self.channel(axis)).join("duty_cycle");
        write_attr(&path, pulse_us as u64 * 1000).map_err(|e| {
            HalError::CommunicationError(format!("failed to write {}: {e}", path.display()))
        })
    }

    fn shutdown(&mut self) -> Result<(), HalError> {
        if self.mock {
            debug!("PWM shutdown (mock mode)");
            return Ok(());
        }
        for ch in [self.pan_channel, self.tilt_channel] {
            let path = self.channel_dir(ch).join("enable");
            if let Err(e) = write_attr(&path, 0) {
                warn!("Failed to disable PWM channel {ch}: {e}");
            }
        }
        info!("PWM outputs disabled");
        Ok(())
    }
}
