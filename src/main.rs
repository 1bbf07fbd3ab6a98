//! # stickdrive
//!
//! Drive a two-motor ev3dev robot chassis with a gamepad analog stick.
//!
//! Binds each configured controller axis to one motor port and runs the
//! stick-to-motor loop until Ctrl+C or the controller disconnects.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Set up logging with tracing subscriber
//!    - Load the run configuration and the controller layout
//!    - Open the gamepad and the tracker (motors first, then axis
//!      subscriptions)
//!
//! 2. **Main Loop**
//!    - Axis handler tasks map samples to speed commands per motor
//!    - Wait for Ctrl+C or a controller disconnect
//!
//! 3. **Shutdown**
//!    - Close the tracker; motors retain their configured stop behavior
//!    - Exit nonzero if the tracker ended in a failed state
//!
//! # Errors
//!
//! Exits with an error if the configuration is invalid, the controller
//! or a configured motor cannot be found, or the controller disconnects
//! while driving.
//!
//! # Examples
//!
//! Run with the default configuration:
//! ```bash
//! cargo run --release
//! ```
//!
//! Expected output:
//! ```text
//! INFO stickdrive: stickdrive v0.1.0 starting...
//! INFO stickdrive::source::gamepad: controller 'Sony PLAYSTATION(R)3 Controller' connected at /dev/input/event2
//! INFO stickdrive::tracker: tracker 'stickdrive' running with 2 axis bindings
//! INFO stickdrive: Press Ctrl+C to exit
//! ```

use anyhow::{bail, Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use stickdrive::config::Config;
use stickdrive::layout::Layout;
use stickdrive::motor::ev3::Ev3MotorProvider;
use stickdrive::source::gamepad::GamepadSource;
use stickdrive::tracker::Tracker;

/// Configuration file used when none is given on the command line.
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(writer)
        .init();

    info!("stickdrive v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("loading configuration from {config_path}"))?;

    let layout = Layout::load(&config.controller.layout)?;
    info!(
        "using controller layout '{}' ({} axes)",
        layout.name,
        layout.axes.len()
    );

    let source = GamepadSource::open(layout.clone(), &config.controller.device_path)?;
    let mut provider = Ev3MotorProvider::new(&config.drive.motor_driver);

    let mut tracker = Tracker::new("stickdrive", config.drive.clone());
    tracker.open(&layout, Box::new(source), &mut provider)?;
    info!("Press Ctrl+C to exit");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        err = tracker.disconnected() => {
            error!("controller lost: {}", err);
        }
    }

    tracker.close().await;

    if let Some(err) = tracker.last_error() {
        bail!("tracker failed: {err}");
    }
    Ok(())
}
