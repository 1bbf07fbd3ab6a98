//! # ev3dev Tacho Motor Module
//!
//! [`MotorDevice`] implementation for LEGO tacho motors on an ev3dev
//! brick.
//!
//! ev3dev exposes each attached motor as a directory under
//! `/sys/class/tacho-motor/` with plain-text attribute files:
//!
//! | Attribute | Use |
//! |-----------|-----|
//! | `address` | Port the motor is plugged into (e.g. `ev3-ports:outA`) |
//! | `driver_name` | Motor model (e.g. `lego-ev3-l-motor`) |
//! | `stop_action` | Behavior on stop: `brake`, `coast`, `hold` |
//! | `speed_sp` | Target speed in tacho counts per second |
//! | `command` | `run-forever`, `stop`, ... |
//!
//! Attribute writes are ordinary short file writes, so device I/O is
//! fast and bounded.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{BrakeMode, MotorDevice, MotorPort, MotorProvider};
use crate::error::MotorError;

/// Driver name of the LEGO EV3 large motor.
pub const EV3_LARGE_MOTOR_DRIVER: &str = "lego-ev3-l-motor";

/// sysfs class directory holding one entry per attached tacho motor.
const SYSFS_ROOT: &str = "/sys/class/tacho-motor";

/// A tacho motor bound to one sysfs directory.
#[derive(Debug)]
pub struct Ev3TachoMotor {
    node: PathBuf,
    port: MotorPort,
}

impl Ev3TachoMotor {
    /// Finds the motor attached to `port` under the default sysfs root.
    ///
    /// # Errors
    ///
    /// Returns [`MotorError::NotFound`] if no attached motor matches the
    /// port and driver name.
    pub fn find(port: &MotorPort, driver: &str) -> Result<Self, MotorError> {
        Self::find_in(Path::new(SYSFS_ROOT), port, driver)
    }

    /// Finds the motor attached to `port` under an explicit sysfs root.
    pub fn find_in(root: &Path, port: &MotorPort, driver: &str) -> Result<Self, MotorError> {
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("cannot read {}: {}", root.display(), e);
                return Err(MotorError::NotFound(port.name().to_string()));
            }
        };

        // ev3dev addresses ports as "ev3-ports:outA"; accept the bare
        // port name too.
        let full_address = format!("ev3-ports:{}", port.name());

        for entry in entries.flatten() {
            let node = entry.path();

            let address = match read_attr(&node, "address") {
                Ok(address) => address,
                Err(e) => {
                    debug!("skipping {}: {}", node.display(), e);
                    continue;
                }
            };
            if address != full_address && address != port.name() {
                continue;
            }

            let driver_name = match read_attr(&node, "driver_name") {
                Ok(driver_name) => driver_name,
                Err(e) => {
                    debug!("skipping {}: {}", node.display(), e);
                    continue;
                }
            };
            if driver_name != driver {
                debug!(
                    "motor on '{}' has driver '{}', wanted '{}'",
                    address, driver_name, driver
                );
                continue;
            }

            debug!("found {} on port '{}' at {}", driver, port, node.display());
            return Ok(Self {
                node,
                port: port.clone(),
            });
        }

        Err(MotorError::NotFound(port.name().to_string()))
    }

    /// Returns the port this motor is attached to.
    #[must_use]
    pub fn port(&self) -> &MotorPort {
        &self.port
    }

    fn write_attr(&self, attr: &str, value: &str) -> io::Result<()> {
        fs::write(self.node.join(attr), value)
    }
}

/// Reads a sysfs attribute, trimming the trailing newline.
fn read_attr(node: &Path, attr: &str) -> io::Result<String> {
    Ok(fs::read_to_string(node.join(attr))?.trim().to_string())
}

impl MotorDevice for Ev3TachoMotor {
    fn set_stop_action(&mut self, action: BrakeMode) -> io::Result<()> {
        self.write_attr("stop_action", action.as_str())
    }

    fn set_speed(&mut self, speed: i32) -> io::Result<()> {
        if speed == 0 {
            // "stop" applies the configured stop_action.
            self.write_attr("command", "stop")
        } else {
            self.write_attr("speed_sp", &speed.to_string())?;
            self.write_attr("command", "run-forever")
        }
    }
}

/// [`MotorProvider`] backed by the ev3dev sysfs tree.
pub struct Ev3MotorProvider {
    driver: String,
    root: PathBuf,
}

impl Ev3MotorProvider {
    /// Creates a provider acquiring motors with the given driver name.
    #[must_use]
    pub fn new(driver: &str) -> Self {
        Self::with_root(driver, Path::new(SYSFS_ROOT))
    }

    /// Creates a provider scanning an explicit sysfs root.
    #[must_use]
    pub fn with_root(driver: &str, root: &Path) -> Self {
        Self {
            driver: driver.to_string(),
            root: root.to_path_buf(),
        }
    }
}

impl MotorProvider for Ev3MotorProvider {
    fn acquire(&mut self, port: &MotorPort) -> Result<Box<dyn MotorDevice>, MotorError> {
        Ev3TachoMotor::find_in(&self.root, port, &self.driver)
            .map(|motor| Box::new(motor) as Box<dyn MotorDevice>)
    }
}
