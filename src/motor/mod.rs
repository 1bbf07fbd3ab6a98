//! # Motor Module
//!
//! Motor ports, stop behavior, and the capability interface to physical
//! motor outputs.
//!
//! The drive core never talks to hardware directly. It holds a
//! [`MotorHandle`] per bound motor, which wraps a [`MotorDevice`]
//! capability (set a target speed, set the stop action) and enforces the
//! brake-safe ordering: a handle refuses speed commands until its stop
//! action has been configured successfully at least once.

use serde::Deserialize;
use std::fmt;

use crate::error::MotorError;

pub mod ev3;

/// Identifies one physical motor output (e.g. "outA").
///
/// Assigned at configuration time and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MotorPort(String);

impl MotorPort {
    /// Creates a port from its configured name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the port name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MotorPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MotorPort {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A motor's behavior when commanded to halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrakeMode {
    /// Short the windings for active braking.
    Brake,
    /// Cut power and let the motor spin down freely.
    Coast,
    /// Actively hold the current position.
    Hold,
}

impl BrakeMode {
    /// Returns the ev3dev `stop_action` attribute value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BrakeMode::Brake => "brake",
            BrakeMode::Coast => "coast",
            BrakeMode::Hold => "hold",
        }
    }
}

impl fmt::Display for BrakeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability interface to one physical motor output.
///
/// Implementations are expected to complete quickly (bounded-latency
/// device I/O); the tracker isolates each device on its own handler task
/// so a stall on one motor cannot delay another axis.
#[cfg_attr(test, mockall::automock)]
pub trait MotorDevice: Send + fmt::Debug {
    /// Sets the motor's behavior for subsequent stop commands.
    fn set_stop_action(&mut self, action: BrakeMode) -> std::io::Result<()>;

    /// Commands an immediate target speed. A speed of 0 halts the motor
    /// using the configured stop action.
    fn set_speed(&mut self, speed: i32) -> std::io::Result<()>;
}

/// Acquires motor devices for configured ports while the tracker opens.
pub trait MotorProvider {
    /// Returns a device for the given port.
    ///
    /// # Errors
    ///
    /// Returns [`MotorError::NotFound`] if no motor is attached to the
    /// port.
    fn acquire(&mut self, port: &MotorPort) -> Result<Box<dyn MotorDevice>, MotorError>;
}

/// Exclusive handle to one motor, owned by exactly one axis handler.
///
/// Created while the tracker opens, moved into the handler task for its
/// bound axis, and dropped on close. The handle tracks whether the stop
/// action has been configured and rejects speed commands until it has,
/// so a motor can never move before its halt behavior is known.
pub struct MotorHandle {
    port: MotorPort,
    device: Box<dyn MotorDevice>,
    configured: bool,
}

impl fmt::Debug for MotorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotorHandle")
            .field("port", &self.port)
            .field("configured", &self.configured)
            .finish_non_exhaustive()
    }
}

impl MotorHandle {
    /// Wraps a freshly acquired device. The handle is not ready until
    /// [`MotorHandle::configure`] succeeds.
    #[must_use]
    pub fn new(port: MotorPort, device: Box<dyn MotorDevice>) -> Self {
        Self {
            port,
            device,
            configured: false,
        }
    }

    /// Returns the port this handle drives.
    #[must_use]
    pub fn port(&self) -> &MotorPort {
        &self.port
    }

    /// Returns whether the stop action has been configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Configures the motor's stop action. Must succeed before any speed
    /// command is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`MotorError::Io`] if the device rejects the action; the
    /// tracker treats this as fatal at open time.
    pub fn configure(&mut self, action: BrakeMode) -> Result<(), MotorError> {
        self.device
            .set_stop_action(action)
            .map_err(|e| MotorError::Io {
                port: self.port.name().to_string(),
                message: e.to_string(),
            })?;
        self.configured = true;
        Ok(())
    }

    /// Commands a target speed.
    ///
    /// Callers deliver already-saturated values (see
    /// [`SpeedProfile::map`](crate::mapper::SpeedProfile::map)); the
    /// handle does not clamp.
    ///
    /// # Errors
    ///
    /// Returns [`MotorError::Unconfigured`] if [`MotorHandle::configure`]
    /// has not succeeded yet, or [`MotorError::Io`] if the device write
    /// fails. Run-time `Io` errors are logged and dropped by the handler;
    /// the motor simply misses that update.
    pub fn set_speed(&mut self, speed: i32) -> Result<(), MotorError> {
        if !self.configured {
            return Err(MotorError::Unconfigured(self.port.name().to_string()));
        }
        self.device.set_speed(speed).map_err(|e| MotorError::Io {
            port: self.port.name().to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// One recorded call on a [`RecordingMotor`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MotorOp {
        StopAction(BrakeMode),
        Speed(i32),
    }

    /// Mock motor device recording every call for later inspection.
    ///
    /// Clones share the underlying recording, so a clone can be handed
    /// to the code under test while the original stays available for
    /// assertions.
    #[derive(Clone, Debug)]
    pub struct RecordingMotor {
        pub ops: Arc<Mutex<Vec<MotorOp>>>,
        pub speed_attempts: Arc<Mutex<usize>>,
        pub speed_error: Arc<Mutex<Option<io::ErrorKind>>>,
        pub stop_error: Arc<Mutex<Option<io::ErrorKind>>>,
    }

    impl RecordingMotor {
        pub fn new() -> Self {
            Self {
                ops: Arc::new(Mutex::new(Vec::new())),
                speed_attempts: Arc::new(Mutex::new(0)),
                speed_error: Arc::new(Mutex::new(None)),
                stop_error: Arc::new(Mutex::new(None)),
            }
        }

        pub fn ops(&self) -> Vec<MotorOp> {
            self.ops.lock().unwrap().clone()
        }

        /// Speed commands received so far, in order.
        pub fn speeds(&self) -> Vec<i32> {
            self.ops()
                .into_iter()
                .filter_map(|op| match op {
                    MotorOp::Speed(s) => Some(s),
                    MotorOp::StopAction(_) => None,
                })
                .collect()
        }

        /// Speed commands attempted, including ones that failed.
        pub fn speed_attempts(&self) -> usize {
            *self.speed_attempts.lock().unwrap()
        }

        pub fn set_speed_error(&self, kind: io::ErrorKind) {
            *self.speed_error.lock().unwrap() = Some(kind);
        }

        pub fn set_stop_error(&self, kind: io::ErrorKind) {
            *self.stop_error.lock().unwrap() = Some(kind);
        }
    }

    impl MotorDevice for RecordingMotor {
        fn set_stop_action(&mut self, action: BrakeMode) -> io::Result<()> {
            if let Some(kind) = *self.stop_error.lock().unwrap() {
                return Err(io::Error::new(kind, "mock stop_action error"));
            }
            self.ops.lock().unwrap().push(MotorOp::StopAction(action));
            Ok(())
        }

        fn set_speed(&mut self, speed: i32) -> io::Result<()> {
            *self.speed_attempts.lock().unwrap() += 1;
            if let Some(kind) = *self.speed_error.lock().unwrap() {
                return Err(io::Error::new(kind, "mock set_speed error"));
            }
            self.ops.lock().unwrap().push(MotorOp::Speed(speed));
            Ok(())
        }
    }

    /// Mock provider serving recording motors from a fixed port map.
    pub struct MapProvider {
        pub motors: HashMap<String, RecordingMotor>,
        pub acquired: Arc<Mutex<Vec<String>>>,
    }

    impl MapProvider {
        pub fn new(ports: &[&str]) -> Self {
            let motors = ports
                .iter()
                .map(|p| (p.to_string(), RecordingMotor::new()))
                .collect();
            Self {
                motors,
                acquired: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn motor(&self, port: &str) -> &RecordingMotor {
            &self.motors[port]
        }

        pub fn acquired(&self) -> Vec<String> {
            self.acquired.lock().unwrap().clone()
        }
    }

    impl MotorProvider for MapProvider {
        fn acquire(&mut self, port: &MotorPort) -> Result<Box<dyn MotorDevice>, MotorError> {
            self.acquired.lock().unwrap().push(port.name().to_string());
            self.motors
                .get(port.name())
                .cloned()
                .map(|m| Box::new(m) as Box<dyn MotorDevice>)
                .ok_or_else(|| MotorError::NotFound(port.name().to_string()))
        }
    }
}
