use crate::error::{Result, SensorError};
use log::{debug, warn};
use rusb::{Context, DeviceHandle, Direction, Language, Recipient, RequestType, UsbContext};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinError;

// The open device, with its interface claimed. Shared between the SensorHandle and any
// transfers still running on the blocking pool, the claim is released when the last of
// them lets go.
struct ClaimedDevice {
    handle: DeviceHandle<Context>,
    interface: u8,
}

impl Drop for ClaimedDevice {
    fn drop(&mut self) {
        debug!("Releasing interface {}", self.interface);
        if let Err(error) = self.handle.release_interface(self.interface) {
            // The device may have already gone away, nothing more we can do.
            debug!("Unable to release interface {}: {}", self.interface, error);
        }
    }
}

/// An open, configured and claimed connection to a sensor.
///
/// Owned by the [`Transport`](crate::transport::Transport) that created it and only ever lent
/// out by reference. Dropping it cancels any transfers that are still in flight; they will
/// resolve to [`SensorError::Cancelled`].
pub struct SensorHandle {
    device: Arc<ClaimedDevice>,
    runtime: Handle,
    cancelled: Arc<AtomicBool>,

    vendor_id: u16,
    product_id: u16,
    configuration: u8,
    timeout: Duration,
}

/// Plain descriptor information about a connected sensor.
#[derive(Debug, Clone)]
pub struct SensorDescriptor {
    pub(crate) vendor_id: u16,
    pub(crate) product_id: u16,
    pub(crate) device_version: (u8, u8, u8),
    pub(crate) manufacturer: String,
    pub(crate) product_name: String,
}

impl SensorDescriptor {
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }
    pub fn product_id(&self) -> u16 {
        self.product_id
    }
    pub fn device_version(&self) -> (u8, u8, u8) {
        self.device_version
    }
    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }
    pub fn product_name(&self) -> &str {
        &self.product_name
    }
}

impl SensorHandle {
    /// Opens the first device matching `vendor_id`/`product_id`, selects `configuration` and
    /// claims `interface`.
    ///
    /// Anything acquired before a failing step is released before returning.
    pub(crate) fn open(
        context: &Context,
        runtime: Handle,
        vendor_id: u16,
        product_id: u16,
        interface: u8,
        configuration: u8,
        timeout: Duration,
    ) -> Result<Self> {
        let handle = context
            .open_device_with_vid_pid(vendor_id, product_id)
            .ok_or(SensorError::DeviceNotFound {
                vendor_id,
                product_id,
            })?;

        debug!("Opened device {:?}", handle.device());

        // Not every platform can do this, libusb will tell us, and it's not fatal.
        if let Err(error) = handle.set_auto_detach_kernel_driver(true) {
            debug!("Kernel driver auto-detach unavailable: {}", error);
        }

        // Selecting a configuration fails with Busy while a kernel driver (usually usbhid) holds
        // one of its interfaces, so only do it when the device isn't there already.
        let active = handle.active_configuration();
        if needs_configuration(&active, configuration) {
            debug!(
                "Active configuration is {:?}, selecting {}",
                active, configuration
            );
            if let Err(source) = handle.set_active_configuration(configuration) {
                return Err(SensorError::DeviceNotConfigured {
                    configuration,
                    source,
                });
            }
        }

        handle
            .claim_interface(interface)
            .map_err(|source| SensorError::DeviceNotClaimed { interface, source })?;

        Ok(Self {
            device: Arc::new(ClaimedDevice { handle, interface }),
            runtime,
            cancelled: Arc::new(AtomicBool::new(false)),
            vendor_id,
            product_id,
            configuration,
            timeout,
        })
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    pub fn interface_number(&self) -> u8 {
        self.device.interface
    }

    pub fn configuration_number(&self) -> u8 {
        self.configuration
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn bus_number(&self) -> u8 {
        self.device.handle.device().bus_number()
    }

    pub fn address(&self) -> u8 {
        self.device.handle.device().address()
    }

    /// Reads the device and string descriptors. Runs on the blocking pool like any other
    /// transfer, each request bounded by the handle's timeout.
    pub fn describe(&self) -> impl Future<Output = Result<SensorDescriptor>> + Send + 'static {
        let timeout = self.timeout;
        self.submit(move |handle| {
            let descriptor = handle.device().device_descriptor()?;
            let version = descriptor.device_version();

            let language = first_language(handle.read_languages(timeout)?)?;
            let manufacturer = handle
                .read_manufacturer_string(language, &descriptor, timeout)
                .unwrap_or_default();
            let product_name = handle
                .read_product_string(language, &descriptor, timeout)
                .unwrap_or_default();

            Ok(SensorDescriptor {
                vendor_id: descriptor.vendor_id(),
                product_id: descriptor.product_id(),
                device_version: (version.0, version.1, version.2),
                manufacturer,
                product_name,
            })
        })
    }

    pub fn read_control(
        &self,
        request_type: RequestType,
        request: u8,
        value: u16,
        index: u16,
        length: usize,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send + 'static {
        let timeout = self.timeout;
        let request_type = rusb::request_type(Direction::In, request_type, Recipient::Interface);
        self.submit(move |handle| {
            let mut buf = vec![0; length];
            let read = handle.read_control(request_type, request, value, index, &mut buf, timeout)?;
            buf.truncate(read);
            Ok(buf)
        })
    }

    pub fn write_control(
        &self,
        request_type: RequestType,
        request: u8,
        value: u16,
        index: u16,
        data: Vec<u8>,
    ) -> impl Future<Output = Result<usize>> + Send + 'static {
        let timeout = self.timeout;
        let request_type = rusb::request_type(Direction::Out, request_type, Recipient::Interface);
        self.submit(move |handle| {
            handle.write_control(request_type, request, value, index, &data, timeout)
        })
    }

    pub fn read_bulk(
        &self,
        endpoint: u8,
        length: usize,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send + 'static {
        let timeout = self.timeout;
        self.submit(move |handle| {
            let mut buf = vec![0; length];
            let read = handle.read_bulk(endpoint, &mut buf, timeout)?;
            buf.truncate(read);
            Ok(buf)
        })
    }

    pub fn write_bulk(
        &self,
        endpoint: u8,
        data: Vec<u8>,
    ) -> impl Future<Output = Result<usize>> + Send + 'static {
        let timeout = self.timeout;
        self.submit(move |handle| handle.write_bulk(endpoint, &data, timeout))
    }

    pub fn read_interrupt(
        &self,
        endpoint: u8,
        length: usize,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send + 'static {
        let timeout = self.timeout;
        self.submit(move |handle| {
            let mut buf = vec![0; length];
            let read = handle.read_interrupt(endpoint, &mut buf, timeout)?;
            buf.truncate(read);
            Ok(buf)
        })
    }

    // Every transfer runs on the attached runtime's blocking pool, holding its own reference to
    // the device so a disconnect can't pull it out from underneath. The returned future doesn't
    // borrow the handle, so the owner remains free to disconnect while it's pending.
    fn submit<T, F>(&self, transfer: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        T: Send + 'static,
        F: FnOnce(&DeviceHandle<Context>) -> rusb::Result<T> + Send + 'static,
    {
        let device = self.device.clone();
        let cancelled = self.cancelled.clone();
        let runtime = self.runtime.clone();

        async move {
            if cancelled.load(Ordering::Acquire) {
                return Err(SensorError::Cancelled);
            }
            let result = runtime
                .spawn_blocking(move || transfer(&device.handle))
                .await;
            complete_transfer(result, &cancelled)
        }
    }
}

impl Drop for SensorHandle {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if Arc::strong_count(&self.device) > 1 {
            debug!("Device dropped with transfers in flight, they will be cancelled");
        }
    }
}

fn first_language(languages: Vec<Language>) -> rusb::Result<Language> {
    languages.first().cloned().ok_or(rusb::Error::NotFound)
}

// An unreadable active configuration (some platforms can't report it) is set explicitly.
fn needs_configuration(active: &rusb::Result<u8>, wanted: u8) -> bool {
    !matches!(active, Ok(current) if *current == wanted)
}

// A transfer that finishes after its handle was dropped reports Cancelled, whatever libusb
// said, so callers never act on data from a device they no longer own.
pub(crate) fn complete_transfer<T>(
    result: std::result::Result<rusb::Result<T>, JoinError>,
    cancelled: &AtomicBool,
) -> Result<T> {
    if cancelled.load(Ordering::Acquire) {
        return Err(SensorError::Cancelled);
    }

    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => {
            warn!("USB transfer failed: {}", error);
            Err(SensorError::UsbError(error))
        }
        Err(error) if error.is_cancelled() => Err(SensorError::Cancelled),
        Err(error) => Err(SensorError::TransferFailed(error)),
    }
}
