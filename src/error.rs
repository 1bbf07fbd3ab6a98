//! # Error Types
//!
//! Custom error types for stickdrive using `thiserror`.
//!
//! Errors are grouped by subsystem: configuration problems are fatal at
//! open time, motor errors are fatal at open time but contained at run
//! time, and a lost event source terminates the tracker.

use thiserror::Error;

/// Configuration problems detected while loading or opening.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A drive binding references an axis the controller layout does not declare.
    #[error("unknown axis '{0}': not declared by the controller layout")]
    UnknownAxis(String),

    /// A drive binding is structurally invalid.
    #[error("malformed binding for axis '{axis}': {reason}")]
    MalformedBinding { axis: String, reason: String },

    /// TOML parse or validation errors from the run configuration.
    #[error("configuration error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Problems with the controller layout artifact.
    #[error("invalid controller layout: {0}")]
    Layout(String),

    /// Failed to read a configuration file from disk.
    #[error("failed to read '{path}': {message}")]
    Io { path: String, message: String },
}

/// Motor failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MotorError {
    /// No motor is attached to the configured port.
    #[error("no motor found on port '{0}'")]
    NotFound(String),

    /// A speed command was issued before the stop action was configured.
    #[error("motor on port '{0}' was commanded before its stop action was configured")]
    Unconfigured(String),

    /// Device I/O failed. Fatal while opening, logged and dropped at run time.
    #[error("motor I/O error on port '{port}': {message}")]
    Io { port: String, message: String },
}

/// Axis event source failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// No controller matching the layout was found.
    #[error("no controller matching layout '{0}' found")]
    DeviceNotFound(String),

    /// Subscribing an axis on the event source failed.
    #[error("failed to subscribe to axis '{0}'")]
    SubscriptionFailed(String),

    /// The event source stopped delivering events.
    #[error("event source disconnected")]
    Disconnected,
}

/// Main error type for stickdrive.
#[derive(Debug, Clone, Error)]
pub enum StickDriveError {
    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Motor errors.
    #[error("motor error: {0}")]
    Motor(#[from] MotorError),

    /// Event source errors.
    #[error("event source error: {0}")]
    Source(#[from] SourceError),

    /// An operation was requested in an incompatible lifecycle state.
    #[error("invalid lifecycle transition: {0}")]
    Lifecycle(String),
}

/// Result type alias for stickdrive.
pub type Result<T> = std::result::Result<T, StickDriveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motor_error_display() {
        let err = MotorError::NotFound("outA".to_string());
        assert_eq!(err.to_string(), "no motor found on port 'outA'");

        let err = MotorError::Io {
            port: "outB".to_string(),
            message: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("outB"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::UnknownAxis("left_q".to_string());
        assert!(err.to_string().contains("left_q"));
    }

    #[test]
    fn test_error_conversion() {
        let err: StickDriveError = MotorError::NotFound("outA".to_string()).into();
        assert!(matches!(
            err,
            StickDriveError::Motor(MotorError::NotFound(_))
        ));

        let err: StickDriveError = SourceError::Disconnected.into();
        assert!(matches!(
            err,
            StickDriveError::Source(SourceError::Disconnected)
        ));
    }
}
