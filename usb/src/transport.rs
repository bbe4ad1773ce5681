use crate::context::{DefaultContext, EventContext};
use crate::device::hotplug::HotplugWatcher;
use crate::device::{HotplugEvent, SensorHandle};
use crate::error::{Result, SensorError};
use log::{debug, info, warn};
use rusb::{Context, Hotplug, HotplugBuilder, Registration, UsbContext};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;
use strum::Display;
use tokio::runtime::Handle;
use tokio::sync::mpsc::Sender;

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum TransportState {
    Unloaded,
    Loaded,
    Attached,
}

/// The connection between the daemon and a single USB colour sensor.
///
/// Drive it in order: [`load`](Self::load), then
/// [`attach_to_context`](Self::attach_to_context), then [`connect`](Self::connect). Calls
/// made out of order fail with [`SensorError::InvalidState`] rather than panicking. A missing
/// sensor is an ordinary outcome of `connect`, reported as an `Internal` error.
pub struct Transport {
    state: TransportState,
    usb: Option<Context>,
    runtime: Option<Handle>,
    context_name: Option<String>,

    handle: Option<SensorHandle>,
    hotplug: Option<Registration<Context>>,

    stopping: Arc<AtomicBool>,
    timeout: Duration,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            state: TransportState::Unloaded,
            usb: None,
            runtime: None,
            context_name: None,
            handle: None,
            hotplug: None,
            stopping: Arc::new(AtomicBool::new(false)),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the timeout applied to every transfer on devices connected after this call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn context_name(&self) -> Option<&str> {
        self.context_name.as_deref()
    }

    pub fn load(&mut self) -> Result<()> {
        self.require(TransportState::Unloaded, "load")?;

        let usb = Context::new()?;
        let version = rusb::version();
        debug!(
            "USB subsystem loaded, libusb {}.{}.{}",
            version.major(),
            version.minor(),
            version.micro()
        );

        self.usb = Some(usb);
        self.state = TransportState::Loaded;
        Ok(())
    }

    /// Binds event handling to `context`, or to the process-wide default when `None`.
    pub fn attach_to_context(&mut self, context: Option<Arc<dyn EventContext>>) -> Result<()> {
        self.require(TransportState::Loaded, "attach to a context")?;

        let context = context.unwrap_or_else(|| Arc::new(DefaultContext));
        let runtime = context.runtime()?;
        let usb = self.usb.clone().ok_or(SensorError::InvalidState {
            operation: "attach to a context",
            state: self.state,
        })?;

        let stopping = self.stopping.clone();
        runtime.spawn_blocking(move || run_event_pump(usb, stopping));

        info!("USB transport attached to the {} event context", context.name());
        self.context_name = Some(context.name().to_owned());
        self.runtime = Some(runtime);
        self.state = TransportState::Attached;
        Ok(())
    }

    /// Opens the device identified by `vendor_id`/`product_id`, selects `configuration` and
    /// claims `interface`. On failure nothing is retained and the transport stays
    /// disconnected.
    pub fn connect(
        &mut self,
        vendor_id: u16,
        product_id: u16,
        interface: u8,
        configuration: u8,
    ) -> Result<()> {
        self.require(TransportState::Attached, "connect")?;
        if self.handle.is_some() {
            return Err(SensorError::AlreadyConnected);
        }

        let (usb, runtime) = match (&self.usb, &self.runtime) {
            (Some(usb), Some(runtime)) => (usb, runtime.clone()),
            _ => {
                return Err(SensorError::InvalidState {
                    operation: "connect",
                    state: self.state,
                })
            }
        };

        let handle = SensorHandle::open(
            usb,
            runtime,
            vendor_id,
            product_id,
            interface,
            configuration,
            self.timeout,
        )
        .map_err(|error| {
            debug!(
                "Unable to connect to {:04x}:{:04x}: {}",
                vendor_id, product_id, error
            );
            error
        })?;

        info!(
            "Connected to {:04x}:{:04x} on bus {} address {}",
            vendor_id,
            product_id,
            handle.bus_number(),
            handle.address()
        );
        self.handle = Some(handle);
        Ok(())
    }

    /// Drops the device handle, cancelling anything still in flight. Does nothing if no device
    /// is connected.
    ///
    /// A transfer already running on the blocking pool keeps the interface claimed until it
    /// completes or hits its timeout. Reconnecting to the same device inside that window can
    /// fail with [`rusb::Error::Busy`].
    pub fn disconnect(&mut self) {
        if let Some(handle) = self.handle.take() {
            info!(
                "Disconnecting from {:04x}:{:04x}",
                handle.vendor_id(),
                handle.product_id()
            );
        }
    }

    pub fn get_connected(&self) -> bool {
        self.handle.is_some()
    }

    pub fn get_device_handle(&self) -> Option<&SensorHandle> {
        self.handle.as_ref()
    }

    /// Like [`get_device_handle`](Self::get_device_handle), but an absent device is an error.
    pub fn device(&self) -> Result<&SensorHandle> {
        self.handle.as_ref().ok_or(SensorError::NotConnected)
    }

    /// Reports arrivals and removals of `vendor_id`/`product_id` devices to `sender`. Events are
    /// delivered by the attached event context; replaces any previous watch.
    pub fn watch_hotplug(
        &mut self,
        vendor_id: u16,
        product_id: u16,
        sender: Sender<HotplugEvent>,
    ) -> Result<()> {
        self.require(TransportState::Attached, "watch for hotplug events")?;
        if !rusb::has_hotplug() {
            return Err(SensorError::HotplugUnsupported);
        }
        let usb = self.usb.as_ref().ok_or(SensorError::InvalidState {
            operation: "watch for hotplug events",
            state: self.state,
        })?;

        let watcher: Box<dyn Hotplug<Context>> = Box::new(HotplugWatcher::new(sender));
        let mut builder = HotplugBuilder::new();
        builder
            .vendor_id(vendor_id)
            .product_id(product_id)
            .enumerate(false);
        let registration = builder.register(usb, watcher)?;

        debug!("Watching for {:04x}:{:04x} hotplug events", vendor_id, product_id);
        self.hotplug = Some(registration);
        Ok(())
    }

    fn require(&self, expected: TransportState, operation: &'static str) -> Result<()> {
        if self.state != expected {
            warn!("Attempted to {} while {}", operation, self.state);
            return Err(SensorError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.disconnect();
        self.hotplug = None;
        self.stopping.store(true, Ordering::Relaxed);
    }
}

fn run_event_pump(usb: Context, stopping: Arc<AtomicBool>) {
    debug!("USB event pump started");
    while !stopping.load(Ordering::Relaxed) {
        if let Err(error) = usb.handle_events(Some(EVENT_POLL_INTERVAL)) {
            if error != rusb::Error::Interrupted {
                warn!("Error while handling USB events: {}", error);
                sleep(EVENT_POLL_INTERVAL);
            }
        }
    }
    debug!("USB event pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn fresh_transport_is_unloaded_and_disconnected() {
        let transport = Transport::new();
        assert_eq!(transport.state(), TransportState::Unloaded);
        assert!(!transport.get_connected());
        assert!(transport.get_device_handle().is_none());
        assert!(transport.context_name().is_none());
        assert_eq!(
            transport.device().err().map(|e| e.kind()),
            Some(ErrorKind::InvalidState)
        );
    }

    #[test]
    fn attach_before_load_is_rejected() {
        let mut transport = Transport::new();
        let error = transport.attach_to_context(None).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidState);
        assert_eq!(transport.state(), TransportState::Unloaded);
    }

    #[test]
    fn connect_before_attach_is_rejected() {
        let mut transport = Transport::new();
        let error = transport.connect(0xffff, 0xffff, 1, 1).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidState);
        assert!(!transport.get_connected());
    }

    #[test]
    fn hotplug_before_attach_is_rejected() {
        let (sender, _receiver) = tokio::sync::mpsc::channel(4);
        let mut transport = Transport::new();
        let error = transport.watch_hotplug(0xffff, 0xffff, sender).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn disconnect_without_device_is_a_no_op() {
        let mut transport = Transport::new();
        transport.disconnect();
        transport.disconnect();
        assert!(!transport.get_connected());
        assert_eq!(transport.state(), TransportState::Unloaded);
    }
}
