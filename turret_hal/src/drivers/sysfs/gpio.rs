use super::write_attr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use turret_common::hal::driver::{EmitterDriver, HalError};

/// Emitter output through `/sys/class/gpio/gpioN`.
#[derive(Debug)]
pub struct SysfsGpioDriver {
    base: PathBuf,
    pin: u32,
    mock: bool,
}

impl SysfsGpioDriver {
    pub fn new(base: &Path, pin: u32) -> Self {
        Self {
            base: base.to_path_buf(),
            pin,
            mock: false,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.mock
    }

    fn pin_dir(&self) -> PathBuf {
        self.base.join(format!("gpio{}", self.pin))
    }

    fn setup(&self) -> std::io::Result<()> {
        if !self.pin_dir().exists() {
            write_attr(&self.base.join("export"), self.pin)?;
        }
        write_attr(&self.pin_dir().join("direction"), "out")?;
        write_attr(&self.pin_dir().join("value"), 0)
    }
}

impl EmitterDriver for SysfsGpioDriver {
    fn name(&self) -> &'static str {
        "sysfs-gpio"
    }

    fn init(&mut self) -> Result<(), HalError> {
        if !self.base.exists() {
            warn!("GPIO base {:?} not present - emitter output in mock mode", self.base);
            self.mock = true;
            return Ok(());
        }
        match self.setup() {
            Ok(()) => {
                self.mock = false;
                info!("Emitter GPIO {} initialized (low)", self.pin);
            }
            Err(e) => {
                warn!("Emitter GPIO {} setup failed ({e}) - mock mode", self.pin);
                self.mock = true;
            }
        }
        Ok(())
    }

    fn set_output(&mut self, on: bool) -> Result<(), HalError> {
        if self.mock {
            debug!("Emitter GPIO (mock): {}", if on { 1 } else { 0 });
            return Ok(());
        }
        let path = self.pin_dir().join("value");
        write_attr(&path, if on { 1 } else { 0 }).map_err(|e| {
            HalError::CommunicationError(format!("failed to write {}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn init_drives_pin_low() {
        let base = tempdir().unwrap();
        fs::create_dir(base.path().join("gpio23")).unwrap();
        let mut driver = SysfsGpioDriver::new(base.path(), 23);
        driver.init().unwrap();
        assert!(!driver.is_mock());
        let pin = base.path().join("gpio23");
        assert_eq!(fs::read_to_string(pin.join("direction")).unwrap(), "out");
        assert_eq!(fs::read_to_string(pin.join("value")).unwrap(), "0");

        driver.set_output(true).unwrap();
        assert_eq!(fs::read_to_string(pin.join("value")).unwrap(), "1");
        driver.shutdown().unwrap();
        assert_eq!(fs::read_to_string(pin.join("value")).unwrap(), "0");
    }

    #[test]
    fn unexported_pin_without_kernel_falls_back_to_mock() {
        // Writing "export" creates a plain file, the pin directory never appears.
        let base = tempdir().unwrap();
        let mut driver = SysfsGpioDriver::new(base.path(), 4);
        driver.init().unwrap();
        assert!(driver.is_mock());
        assert!(driver.set_output(true).is_ok());
    }
}
