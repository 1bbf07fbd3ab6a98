//! # Configuration Module
//!
//! Handles loading and validating the run configuration from TOML files.
//!
//! The configuration names the controller layout artifact to use and the
//! drive bindings: which axis drives which motor port, with what
//! polarity, deadzone, and speed bound. Defaults reproduce a classic
//! tank-drive setup, left stick Y to `outA` and right stick Y to `outB`,
//! braking on stop.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::motor::BrakeMode;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub controller: ControllerConfig,
    pub drive: DriveConfig,
}

/// Controller selection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    /// Path to the controller layout artifact (JSON).
    #[serde(default = "default_layout_path")]
    pub layout: String,

    /// Explicit `/dev/input/eventX` path; empty means auto-detect.
    #[serde(default)]
    pub device_path: String,
}

/// Drive configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DriveConfig {
    /// Motor driver name to acquire on each bound port.
    #[serde(default = "default_motor_driver")]
    pub motor_driver: String,

    /// Stop behavior configured on every motor before it may move.
    #[serde(default = "default_stop_action")]
    pub stop_action: BrakeMode,

    /// Axis-to-motor bindings.
    #[serde(default = "default_bindings")]
    pub bindings: Vec<BindingConfig>,
}

/// One axis-to-motor binding
#[derive(Debug, Deserialize, Clone)]
pub struct BindingConfig {
    /// Axis name from the controller layout.
    pub axis: String,

    /// Motor port the axis drives.
    pub port: String,

    /// Flip the axis sign. Set on Y axes so stick-up means forward.
    #[serde(default = "default_invert")]
    pub invert: bool,

    /// Deadzone fraction, 0.0 inclusive to 1.0 exclusive.
    #[serde(default = "default_deadzone")]
    pub deadzone: f32,

    /// Speed magnitude bound for this motor.
    #[serde(default = "default_max_speed")]
    pub max_speed: i32,
}

// Default value functions
fn default_layout_path() -> String {
    "config/dualshock3.json".to_string()
}

fn default_motor_driver() -> String {
    "lego-ev3-l-motor".to_string()
}

fn default_stop_action() -> BrakeMode {
    BrakeMode::Brake
}

fn default_invert() -> bool {
    true
}

fn default_deadzone() -> f32 {
    0.1
}

fn default_max_speed() -> i32 {
    100
}

fn default_bindings() -> Vec<BindingConfig> {
    vec![
        BindingConfig {
            axis: "left_y".to_string(),
            port: "outA".to_string(),
            invert: default_invert(),
            deadzone: default_deadzone(),
            max_speed: default_max_speed(),
        },
        BindingConfig {
            axis: "right_y".to_string(),
            port: "outB".to_string(),
            invert: default_invert(),
            deadzone: default_deadzone(),
            max_speed: default_max_speed(),
        },
    ]
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, TOML parsing fails, or
    /// validation fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use stickdrive::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), stickdrive::error::ConfigError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        if self.drive.motor_driver.is_empty() {
            return Err(ConfigError::Toml(toml::de::Error::custom(
                "motor_driver cannot be empty",
            )));
        }

        if self.drive.bindings.is_empty() {
            return Err(ConfigError::Toml(toml::de::Error::custom(
                "drive must declare at least one axis binding",
            )));
        }

        for binding in &self.drive.bindings {
            binding.validate()?;
        }

        // One motor per axis: duplicate axes or ports would let two
        // handlers race on the same motor.
        for (i, binding) in self.drive.bindings.iter().enumerate() {
            if self.drive.bindings[..i].iter().any(|b| b.axis == binding.axis) {
                return Err(ConfigError::MalformedBinding {
                    axis: binding.axis.clone(),
                    reason: "axis is bound twice".to_string(),
                });
            }
            if self.drive.bindings[..i].iter().any(|b| b.port == binding.port) {
                return Err(ConfigError::MalformedBinding {
                    axis: binding.axis.clone(),
                    reason: format!("port '{}' is already driven by another axis", binding.port),
                });
            }
        }

        Ok(())
    }
}

impl BindingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.axis.is_empty() {
            return Err(ConfigError::MalformedBinding {
                axis: self.axis.clone(),
                reason: "axis name cannot be empty".to_string(),
            });
        }

        if self.port.is_empty() {
            return Err(ConfigError::MalformedBinding {
                axis: self.axis.clone(),
                reason: "port cannot be empty".to_string(),
            });
        }

        if !(0.0..1.0).contains(&self.deadzone) {
            return Err(ConfigError::MalformedBinding {
                axis: self.axis.clone(),
                reason: format!("deadzone {} must be in [0.0, 1.0)", self.deadzone),
            });
        }

        if self.max_speed < 1 {
            return Err(ConfigError::MalformedBinding {
                axis: self.axis.clone(),
                reason: format!("max_speed {} must be at least 1", self.max_speed),
            });
        }

        Ok(())
    }
}
