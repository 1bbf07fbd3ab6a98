//! # Controller Layout Module
//!
//! Loads the controller layout artifact: a JSON file naming the axes and
//! buttons of a specific pad model together with their evdev codes and
//! raw value ranges (see `config/dualshock3.json`).
//!
//! The layout is consumed, not produced, by this crate. The event source
//! uses it to route raw input events to named axis streams and to
//! normalize raw values; the tracker uses it to reject bindings that
//! reference axes the pad does not have.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// One named analog axis of the controller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AxisSpec {
    /// Axis name referenced by drive bindings (e.g. "left_y").
    pub name: String,
    /// evdev absolute-axis code emitting this axis (e.g. 1 for ABS_Y).
    pub code: u16,
    /// Smallest raw value the pad reports.
    #[serde(default = "default_axis_min")]
    pub min: i32,
    /// Largest raw value the pad reports.
    #[serde(default = "default_axis_max")]
    pub max: i32,
}

/// One named button of the controller.
///
/// Buttons are declared so the artifact fully describes the pad, but the
/// drive core only consumes axes; button events are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ButtonSpec {
    /// Button name (e.g. "square").
    pub name: String,
    /// evdev key code emitting this button.
    pub code: u16,
}

/// A controller layout artifact.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Layout {
    /// Human-readable pad model name, matched against the evdev device
    /// name when no USB ids are declared.
    pub name: String,
    /// USB vendor id used for device detection.
    #[serde(default)]
    pub vendor_id: Option<u16>,
    /// USB product id used for device detection.
    #[serde(default)]
    pub product_id: Option<u16>,
    /// Analog axes of the pad.
    pub axes: Vec<AxisSpec>,
    /// Buttons of the pad.
    #[serde(default)]
    pub buttons: Vec<ButtonSpec>,
}

fn default_axis_min() -> i32 {
    0
}

fn default_axis_max() -> i32 {
    255
}

impl AxisSpec {
    /// Converts a raw axis value to a normalized value in -1.0 to 1.0.
    ///
    /// The midpoint of `[min, max]` maps to 0.0; raw values outside the
    /// declared range are clamped.
    ///
    /// # Examples
    ///
    /// ```
    /// use stickdrive::layout::AxisSpec;
    ///
    /// let spec = AxisSpec { name: "left_y".into(), code: 1, min: 0, max: 255 };
    /// assert!((spec.normalize(0) - (-1.0)).abs() < 0.001);
    /// assert!((spec.normalize(255) - 1.0).abs() < 0.001);
    /// assert!(spec.normalize(128).abs() < 0.01);
    /// ```
    #[must_use]
    pub fn normalize(&self, raw: i32) -> f32 {
        let mid = (self.min + self.max) as f32 / 2.0;
        let half = (self.max - self.min) as f32 / 2.0;
        ((raw as f32 - mid) / half).clamp(-1.0, 1.0)
    }
}

impl Layout {
    /// Loads and validates a layout artifact from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Layout`] if it does not parse or validate.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use stickdrive::layout::Layout;
    ///
    /// let layout = Layout::load("config/dualshock3.json")?;
    /// assert!(layout.axis("left_y").is_some());
    /// # Ok::<(), stickdrive::error::ConfigError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let layout: Layout =
            serde_json::from_str(&contents).map_err(|e| ConfigError::Layout(e.to_string()))?;
        layout.validate()?;
        Ok(layout)
    }

    /// Looks up an axis by name.
    #[must_use]
    pub fn axis(&self, name: &str) -> Option<&AxisSpec> {
        self.axes.iter().find(|a| a.name == name)
    }

    /// Validates the artifact.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Layout("layout name cannot be empty".into()));
        }

        if self.axes.is_empty() {
            return Err(ConfigError::Layout(format!(
                "layout '{}' declares no axes",
                self.name
            )));
        }

        for axis in &self.axes {
            if axis.min >= axis.max {
                return Err(ConfigError::Layout(format!(
                    "axis '{}' has an empty raw range ({}..{})",
                    axis.name, axis.min, axis.max
                )));
            }
        }

        for (i, axis) in self.axes.iter().enumerate() {
            if self.axes[..i].iter().any(|a| a.name == axis.name) {
                return Err(ConfigError::Layout(format!(
                    "axis '{}' is declared twice",
                    axis.name
                )));
            }
            if self.axes[..i].iter().any(|a| a.code == axis.code) {
                return Err(ConfigError::Layout(format!(
                    "axis '{}' reuses evdev code {}",
                    axis.name, axis.code
                )));
            }
        }

        Ok(())
    }
}
