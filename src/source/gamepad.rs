//! # Gamepad Source Module
//!
//! [`AxisEventSource`] backed by a Linux evdev gamepad.
//!
//! ## Device Detection
//!
//! The pad is located by scanning `/dev/input/event*` and matching the
//! USB vendor/product ids declared in the controller layout, falling
//! back to an exact device-name match. An explicit device path in the
//! run configuration skips the scan.
//!
//! ## Event Routing
//!
//! A blocking reader task fetches raw events from the device and routes
//! absolute-axis events to subscribed axis channels by evdev code,
//! normalizing each raw value with the layout's declared range. One
//! channel per axis preserves per-axis ordering while letting handlers
//! for different axes run concurrently. Key (button) events and sync
//! events are ignored.
//!
//! Routing never blocks on a slow subscriber: when an axis queue is
//! full the sample is dropped, and a subscriber that went away has its
//! route removed.

use evdev::Device;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use super::{AxisEventSource, AxisSample, Subscription};
use crate::error::SourceError;
use crate::layout::{AxisSpec, Layout};

/// Queue depth per subscribed axis. Stick events are small and frequent;
/// a short queue bounds latency under bursts.
const SAMPLE_QUEUE: usize = 32;

struct AxisRoute {
    spec: AxisSpec,
    tx: mpsc::Sender<AxisSample>,
}

type RouteMap = Arc<Mutex<HashMap<u16, AxisRoute>>>;

/// Gamepad-backed axis event source.
pub struct GamepadSource {
    layout: Layout,
    device_path: String,
    routes: RouteMap,
}

impl GamepadSource {
    /// Opens the controller described by the layout and starts the
    /// reader task.
    ///
    /// # Arguments
    ///
    /// * `layout` - Controller layout to match and route with
    /// * `device_path` - Explicit `/dev/input/eventX` path, or empty to
    ///   auto-detect
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::DeviceNotFound`] if no matching pad is
    /// connected or the device cannot be opened.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use stickdrive::layout::Layout;
    /// use stickdrive::source::gamepad::GamepadSource;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> anyhow::Result<()> {
    /// let layout = Layout::load("config/dualshock3.json")?;
    /// let source = GamepadSource::open(layout, "")?;
    /// println!("pad connected at {}", source.device_path());
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(layout: Layout, device_path: &str) -> Result<Self, SourceError> {
        let (device, device_path) = if device_path.is_empty() {
            Self::detect(&layout)?
        } else {
            let device = Device::open(device_path).map_err(|e| {
                SourceError::DeviceNotFound(format!("{device_path}: {e}"))
            })?;
            (device, device_path.to_string())
        };

        info!("controller '{}' connected at {}", layout.name, device_path);

        let routes: RouteMap = Arc::new(Mutex::new(HashMap::new()));
        let reader_routes = Arc::clone(&routes);
        tokio::task::spawn_blocking(move || read_loop(device, reader_routes));

        Ok(Self {
            layout,
            device_path,
            routes,
        })
    }

    /// Returns the `/dev/input/eventX` path in use.
    #[must_use]
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Scans `/dev/input` for a device matching the layout.
    fn detect(layout: &Layout) -> Result<(Device, String), SourceError> {
        let input_dir = Path::new("/dev/input");

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| SourceError::DeviceNotFound(format!("/dev/input: {e}")))?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().starts_with("event"))
                    .unwrap_or(false)
            })
            .collect();

        // Deterministic selection when several pads are connected.
        entries.sort();

        for path in entries {
            let device = match Device::open(&path) {
                Ok(device) => device,
                Err(e) => {
                    debug!("could not open {}: {}", path.display(), e);
                    continue;
                }
            };

            if Self::matches(layout, &device) {
                return Ok((device, path.to_string_lossy().to_string()));
            }
        }

        Err(SourceError::DeviceNotFound(layout.name.clone()))
    }

    fn matches(layout: &Layout, device: &Device) -> bool {
        if let (Some(vendor), Some(product)) = (layout.vendor_id, layout.product_id) {
            let id = device.input_id();
            return id.vendor() == vendor && id.product() == product;
        }
        device.name() == Some(layout.name.as_str())
    }
}

impl AxisEventSource for GamepadSource {
    fn subscribe(&mut self, axis: &str) -> Result<Subscription, SourceError> {
        register_axis(&self.layout, &self.routes, axis)
    }
}

/// Registers an axis route and returns its subscription.
fn register_axis(
    layout: &Layout,
    routes: &RouteMap,
    axis: &str,
) -> Result<Subscription, SourceError> {
    let spec = layout
        .axis(axis)
        .ok_or_else(|| SourceError::SubscriptionFailed(axis.to_string()))?;

    let mut routes = routes.lock().unwrap();
    if routes.contains_key(&spec.code) {
        return Err(SourceError::SubscriptionFailed(axis.to_string()));
    }

    let (tx, sub) = Subscription::channel(axis, SAMPLE_QUEUE);
    routes.insert(
        spec.code,
        AxisRoute {
            spec: spec.clone(),
            tx,
        },
    );
    debug!("subscribed axis '{}' (evdev code {})", axis, spec.code);
    Ok(sub)
}

/// Blocking loop fetching raw events and routing axis samples.
///
/// Ends when the device read fails (controller unplugged); clearing the
/// route map then drops every sender, which subscribers observe as a
/// disconnect.
fn read_loop(mut device: Device, routes: RouteMap) {
    loop {
        let events = match device.fetch_events() {
            Ok(events) => events,
            Err(e) => {
                error!("controller read failed: {}", e);
                break;
            }
        };

        for event in events {
            if let evdev::InputEventKind::AbsAxis(axis) = event.kind() {
                dispatch(&routes, axis.0, event.value());
            }
        }
    }

    routes.lock().unwrap().clear();
}

/// Routes one raw absolute-axis event to its subscriber, if any.
fn dispatch(routes: &RouteMap, code: u16, raw: i32) {
    let mut routes = routes.lock().unwrap();
    let Some(route) = routes.get(&code) else {
        return;
    };

    let sample = AxisSample {
        axis: route.spec.name.clone(),
        value: route.spec.normalize(raw),
    };
    trace!(
        "stick event, {}({}) -> {:.3}",
        sample.axis,
        raw,
        sample.value
    );

    match route.tx.try_send(sample) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(sample)) => {
            trace!("axis '{}' queue full, sample dropped", sample.axis);
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("axis subscriber for code {} went away", code);
            routes.remove(&code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_layout() -> Layout {
        Layout {
            name: "Test Pad".to_string(),
            vendor_id: None,
            product_id: None,
            axes: vec![
                AxisSpec {
                    name: "left_y".to_string(),
                    code: 1,
                    min: 0,
                    max: 255,
                },
                AxisSpec {
                    name: "right_y".to_string(),
                    code: 4,
                    min: 0,
                    max: 255,
                },
            ],
            buttons: vec![],
        }
    }

    fn empty_routes() -> RouteMap {
        Arc::new(Mutex::new(HashMap::new()))
    }

    // ==================== Subscription Tests ====================

    #[tokio::test]
    async fn test_register_known_axis() {
        let layout = test_layout();
        let routes = empty_routes();

        let sub = register_axis(&layout, &routes, "left_y").unwrap();
        assert_eq!(sub.axis(), "left_y");
        assert!(routes.lock().unwrap().contains_key(&1));
    }

    #[tokio::test]
    async fn test_register_unknown_axis_fails() {
        let layout = test_layout();
        let routes = empty_routes();

        let err = register_axis(&layout, &routes, "left_q").unwrap_err();
        assert_eq!(err, SourceError::SubscriptionFailed("left_q".to_string()));
        assert!(routes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_twice_fails() {
        let layout = test_layout();
        let routes = empty_routes();

        let _sub = register_axis(&layout, &routes, "left_y").unwrap();
        assert!(matches!(
            register_axis(&layout, &routes, "left_y"),
            Err(SourceError::SubscriptionFailed(_))
        ));
    }

    // ==================== Dispatch Tests ====================

    #[tokio::test]
    async fn test_dispatch_normalizes_and_routes() {
        let layout = test_layout();
        let routes = empty_routes();
        let mut sub = register_axis(&layout, &routes, "left_y").unwrap();

        dispatch(&routes, 1, 255);
        dispatch(&routes, 1, 0);

        let sample = sub.recv().await.unwrap();
        assert_eq!(sample.axis, "left_y");
        assert!((sample.value - 1.0).abs() < 0.001);

        let sample = sub.recv().await.unwrap();
        assert!((sample.value - (-1.0)).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_dispatch_ignores_unsubscribed_code() {
        let layout = test_layout();
        let routes = empty_routes();
        let mut sub = register_axis(&layout, &routes, "left_y").unwrap();

        dispatch(&routes, 4, 255); // right_y, nobody listening
        dispatch(&routes, 1, 255);

        // Only the left_y sample arrives.
        let sample = sub.recv().await.unwrap();
        assert_eq!(sample.axis, "left_y");
        assert!(sub.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_keeps_streams_independent() {
        let layout = test_layout();
        let routes = empty_routes();
        let mut left = register_axis(&layout, &routes, "left_y").unwrap();
        let mut right = register_axis(&layout, &routes, "right_y").unwrap();

        dispatch(&routes, 1, 255);
        dispatch(&routes, 4, 0);

        assert!((left.recv().await.unwrap().value - 1.0).abs() < 0.001);
        assert!((right.recv().await.unwrap().value - (-1.0)).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_dispatch_drops_when_queue_full() {
        let layout = test_layout();
        let routes = empty_routes();

        // A one-slot queue built by hand to exercise the overflow path.
        let spec = layout.axis("left_y").unwrap().clone();
        let (tx, mut sub) = Subscription::channel("left_y", 1);
        routes.lock().unwrap().insert(1, AxisRoute { spec, tx });

        dispatch(&routes, 1, 255);
        dispatch(&routes, 1, 0); // queue full, dropped

        assert!((sub.recv().await.unwrap().value - 1.0).abs() < 0.001);
        assert!(sub.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_removes_route_for_dropped_subscriber() {
        let layout = test_layout();
        let routes = empty_routes();
        let sub = register_axis(&layout, &routes, "left_y").unwrap();
        drop(sub);

        dispatch(&routes, 1, 255);
        assert!(routes.lock().unwrap().is_empty());
    }

    // Integration test - only runs with a connected controller.
    #[tokio::test]
    #[ignore]
    async fn test_open_with_real_hardware() {
        let layout = Layout {
            name: "Sony PLAYSTATION(R)3 Controller".to_string(),
            vendor_id: Some(0x054c),
            product_id: Some(0x0268),
            axes: test_layout().axes,
            buttons: vec![],
        };

        let source = GamepadSource::open(layout, "").expect("no controller connected");
        assert!(source.device_path().starts_with("/dev/input/event"));
    }
}
