//! # Tracker Module
//!
//! Owns the stick-to-motor control loop and its lifecycle.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized --open()--> Opening --> Running --close()--> Closing --> Closed
//!                              |
//!                              +--> Failed (terminal)
//! ```
//!
//! `open()` acquires and configures every bound motor first, then
//! subscribes the bound axes and spawns one handler task per binding.
//! Any open-time failure aborts the whole startup: the tracker ends in
//! `Failed` with nothing subscribed and no partial activation.
//!
//! ## Handlers
//!
//! Each handler task exclusively owns its [`MotorHandle`] and consumes
//! its own axis stream, so axes never contend on shared state and a
//! stalled motor cannot delay the other axis. Run-time motor I/O errors
//! are logged and contained to the event that caused them; a stream that
//! ends (controller gone) drives the tracker toward `Failed`.
//!
//! ## Closing
//!
//! `close()` cancels the handler tasks and drops subscriptions and motor
//! handles. It does not command an explicit stop: the stop action
//! configured during open is the safety backstop, so an in-flight sample
//! racing the close is harmless.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::DriveConfig;
use crate::error::{ConfigError, Result, SourceError, StickDriveError};
use crate::layout::Layout;
use crate::mapper::SpeedProfile;
use crate::motor::{MotorHandle, MotorPort, MotorProvider};
use crate::source::{AxisEventSource, Subscription};

/// Lifecycle state of a [`Tracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Uninitialized,
    Opening,
    Running,
    Closing,
    Closed,
    Failed,
}

/// One axis-to-motor binding resolved against the layout at open time.
#[derive(Debug, Clone)]
struct AxisBinding {
    axis: String,
    port: MotorPort,
    profile: SpeedProfile,
}

struct HandlerTask {
    axis: String,
    task: JoinHandle<()>,
}

/// Binds controller axes to motors and supervises the event loop.
///
/// # Examples
///
/// ```no_run
/// use stickdrive::config::Config;
/// use stickdrive::layout::Layout;
/// use stickdrive::motor::ev3::Ev3MotorProvider;
/// use stickdrive::source::gamepad::GamepadSource;
/// use stickdrive::tracker::Tracker;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let config = Config::load("config/default.toml")?;
/// let layout = Layout::load(&config.controller.layout)?;
///
/// let source = GamepadSource::open(layout.clone(), &config.controller.device_path)?;
/// let mut provider = Ev3MotorProvider::new(&config.drive.motor_driver);
///
/// let mut tracker = Tracker::new("stickdrive", config.drive.clone());
/// tracker.open(&layout, Box::new(source), &mut provider)?;
///
/// tokio::signal::ctrl_c().await?;
/// tracker.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Tracker {
    name: String,
    drive: DriveConfig,
    state: TrackerState,
    last_error: Option<StickDriveError>,
    cancel: CancellationToken,
    handlers: Vec<HandlerTask>,
    source: Option<Box<dyn AxisEventSource>>,
    failure_rx: Option<mpsc::Receiver<String>>,
}

impl Tracker {
    /// Creates an uninitialized tracker for the given drive setup.
    #[must_use]
    pub fn new(name: &str, drive: DriveConfig) -> Self {
        Self {
            name: name.to_string(),
            drive,
            state: TrackerState::Uninitialized,
            last_error: None,
            cancel: CancellationToken::new(),
            handlers: Vec::new(),
            source: None,
            failure_rx: None,
        }
    }

    /// Returns the tracker name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Returns the error that drove the tracker to `Failed`, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&StickDriveError> {
        self.last_error.as_ref()
    }

    /// Opens the tracker: acquires motors, subscribes axes, starts
    /// handlers.
    ///
    /// One-shot; a tracker that failed to open stays `Failed` and a new
    /// instance must be created to retry.
    ///
    /// # Errors
    ///
    /// The first failure aborts the whole startup and is returned:
    /// unknown or duplicate axes ([`ConfigError`]), a missing or
    /// unconfigurable motor ([`MotorError`](crate::error::MotorError)),
    /// or a failed subscription ([`SourceError`]). Motors are acquired
    /// and configured before anything is subscribed, so a motor failure
    /// leaves no axis active.
    pub fn open(
        &mut self,
        layout: &Layout,
        mut source: Box<dyn AxisEventSource>,
        provider: &mut dyn MotorProvider,
    ) -> Result<()> {
        if self.state != TrackerState::Uninitialized {
            return Err(StickDriveError::Lifecycle(format!(
                "cannot open tracker '{}' in state {:?}",
                self.name, self.state
            )));
        }
        self.state = TrackerState::Opening;
        debug!("Opening tracker '{}'...", self.name);

        let bindings = match self.resolve_bindings(layout) {
            Ok(bindings) => bindings,
            Err(err) => return Err(self.fail(err)),
        };

        // All motors must be present and brake-configured before any
        // axis goes live.
        let mut motors = Vec::with_capacity(bindings.len());
        for binding in &bindings {
            let device = match provider.acquire(&binding.port) {
                Ok(device) => device,
                Err(err) => return Err(self.fail(err.into())),
            };
            let mut handle = MotorHandle::new(binding.port.clone(), device);
            if let Err(err) = handle.configure(self.drive.stop_action) {
                return Err(self.fail(err.into()));
            }
            debug!(
                "motor on '{}' ready, stop action '{}'",
                binding.port, self.drive.stop_action
            );
            motors.push(handle);
        }

        let mut subscriptions = Vec::with_capacity(bindings.len());
        for binding in &bindings {
            match source.subscribe(&binding.axis) {
                Ok(sub) => subscriptions.push(sub),
                Err(err) => return Err(self.fail(err.into())),
            }
        }

        let (failure_tx, failure_rx) = mpsc::channel(bindings.len().max(1));
        for ((binding, motor), sub) in bindings.iter().zip(motors).zip(subscriptions) {
            debug!("binding axis '{}' to motor '{}'", binding.axis, binding.port);
            let task = tokio::spawn(axis_loop(
                sub,
                motor,
                binding.profile,
                self.cancel.clone(),
                failure_tx.clone(),
            ));
            self.handlers.push(HandlerTask {
                axis: binding.axis.clone(),
                task,
            });
        }

        self.failure_rx = Some(failure_rx);
        self.source = Some(source);
        self.state = TrackerState::Running;
        info!(
            "tracker '{}' running with {} axis bindings",
            self.name,
            self.handlers.len()
        );
        Ok(())
    }

    /// Resolves the completion of the tracker's event streams: completes
    /// when any axis stream ends while running, marking the tracker
    /// `Failed`. Never completes on a healthy tracker.
    pub async fn disconnected(&mut self) -> SourceError {
        if let Some(rx) = self.failure_rx.as_mut() {
            if let Some(axis) = rx.recv().await {
                error!("axis '{}' event stream ended", axis);
                self.state = TrackerState::Failed;
                self.last_error = Some(SourceError::Disconnected.into());
                return SourceError::Disconnected;
            }
        }
        std::future::pending().await
    }

    /// Closes the tracker: cancels handlers and releases the event
    /// source and motors.
    ///
    /// Best-effort: a handler holding an already-received sample may
    /// still issue one last command before it observes the cancellation.
    /// Motors keep the stop behavior configured at open. A `Failed`
    /// tracker stays `Failed` after cleanup; otherwise the tracker ends
    /// `Closed`.
    pub async fn close(&mut self) {
        if matches!(
            self.state,
            TrackerState::Uninitialized | TrackerState::Closed
        ) {
            return;
        }
        let failed = self.state == TrackerState::Failed;
        self.state = TrackerState::Closing;
        debug!("Closing tracker '{}'...", self.name);

        self.cancel.cancel();
        for handler in self.handlers.drain(..) {
            if let Err(err) = handler.task.await {
                debug!("handler for axis '{}' ended badly: {}", handler.axis, err);
            }
        }

        self.failure_rx = None;
        self.source = None;

        self.state = if failed {
            TrackerState::Failed
        } else {
            TrackerState::Closed
        };
        debug!("tracker '{}' closed", self.name);
    }

    /// Checks every binding against the controller layout.
    fn resolve_bindings(&self, layout: &Layout) -> Result<Vec<AxisBinding>> {
        let mut bindings = Vec::with_capacity(self.drive.bindings.len());
        for config in &self.drive.bindings {
            if layout.axis(&config.axis).is_none() {
                return Err(ConfigError::UnknownAxis(config.axis.clone()).into());
            }
            bindings.push(AxisBinding {
                axis: config.axis.clone(),
                port: MotorPort::new(&config.port),
                profile: SpeedProfile::new(config.invert, config.deadzone, config.max_speed),
            });
        }

        for (i, binding) in bindings.iter().enumerate() {
            if bindings[..i].iter().any(|b| b.port == binding.port) {
                return Err(ConfigError::MalformedBinding {
                    axis: binding.axis.clone(),
                    reason: format!("port '{}' is already driven by another axis", binding.port),
                }
                .into());
            }
        }

        Ok(bindings)
    }

    /// Records a fatal open-time error and returns it.
    fn fail(&mut self, err: StickDriveError) -> StickDriveError {
        error!("tracker '{}' failed to open: {}", self.name, err);
        self.state = TrackerState::Failed;
        self.last_error = Some(err.clone());
        err
    }
}

/// Per-axis event loop: map each sample and forward it to the bound
/// motor. Runs until cancelled or the stream ends.
async fn axis_loop(
    mut sub: Subscription,
    mut motor: MotorHandle,
    profile: SpeedProfile,
    cancel: CancellationToken,
    failure_tx: mpsc::Sender<String>,
) {
    debug!(
        "handler for axis '{}' driving motor '{}' started",
        sub.axis(),
        motor.port()
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            sample = sub.recv() => match sample {
                Some(sample) => {
                    let speed = profile.map(sample.value);
                    trace!(
                        "stick event, {}({:.3}) -> speed {}",
                        sample.axis, sample.value, speed
                    );
                    if let Err(err) = motor.set_speed(speed) {
                        // Contained: this motor misses one update, the
                        // loop and the other axis keep going.
                        warn!("dropping speed command: {}", err);
                    }
                }
                None => {
                    let _ = failure_tx.send(sub.axis().to_string()).await;
                    break;
                }
            }
        }
    }

    debug!("handler for axis '{}' stopped", sub.axis());
}
