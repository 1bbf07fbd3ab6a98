//! # Axis Event Source Module
//!
//! The contract between the tracker and whatever produces controller
//! input.
//!
//! A source hands out one [`Subscription`] per axis name. Samples for a
//! single axis arrive in order (channel FIFO); different axes are
//! independent streams with no ordering or framing guarantee between
//! them, and may be consumed concurrently. A source that stops
//! delivering ends every stream, which subscribers observe as
//! [`Subscription::recv`] returning `None`.

use tokio::sync::mpsc;

use crate::error::SourceError;

pub mod gamepad;

/// One normalized input sample for a named axis.
///
/// Produced per event and consumed immediately; the value is already
/// normalized to -1.0 to 1.0 at the source boundary using the controller
/// layout's raw range.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSample {
    /// Axis name from the controller layout (e.g. "left_y").
    pub axis: String,
    /// Normalized deflection in -1.0 to 1.0.
    pub value: f32,
}

/// Ordered stream of samples for one subscribed axis.
#[derive(Debug)]
pub struct Subscription {
    axis: String,
    rx: mpsc::Receiver<AxisSample>,
}

impl Subscription {
    /// Creates a subscription together with its sending half.
    ///
    /// Sources keep the sender and feed it from their event loop; the
    /// subscription goes to the subscriber.
    #[must_use]
    pub fn channel(axis: impl Into<String>, capacity: usize) -> (mpsc::Sender<AxisSample>, Self) {
        let axis = axis.into();
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { axis, rx })
    }

    /// Returns the subscribed axis name.
    #[must_use]
    pub fn axis(&self) -> &str {
        &self.axis
    }

    /// Receives the next sample, or `None` once the source has
    /// disconnected.
    pub async fn recv(&mut self) -> Option<AxisSample> {
        self.rx.recv().await
    }
}

/// Produces per-axis event streams.
pub trait AxisEventSource: Send {
    /// Subscribes to a named axis.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::SubscriptionFailed`] if the axis cannot be
    /// subscribed (unknown to the source, or already subscribed).
    fn subscribe(&mut self, axis: &str) -> Result<Subscription, SourceError>;
}
