use log::{debug, warn};
use rusb::{Context, Device, Hotplug};
use tokio::sync::mpsc::Sender;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HotplugEvent {
    Arrived { bus_number: u8, address: u8 },
    Left { bus_number: u8, address: u8 },
}

// Runs inside libusb's event handling, which is driven by the transport's event pump. That
// thread mustn't block, so events that don't fit in the channel are dropped.
pub(crate) struct HotplugWatcher {
    sender: Sender<HotplugEvent>,
}

impl HotplugWatcher {
    pub(crate) fn new(sender: Sender<HotplugEvent>) -> Self {
        Self { sender }
    }

    fn send(&self, event: HotplugEvent) {
        if self.sender.is_closed() {
            debug!("Hotplug receiver closed, dropping {:?}", event);
            return;
        }
        if let Err(error) = self.sender.try_send(event) {
            warn!("Unable to deliver hotplug event: {}", error);
        }
    }
}

impl Hotplug<Context> for HotplugWatcher {
    fn device_arrived(&mut self, device: Device<Context>) {
        debug!("Device arrived: {:?}", device);
        self.send(HotplugEvent::Arrived {
            bus_number: device.bus_number(),
            address: device.address(),
        });
    }

    fn device_left(&mut self, device: Device<Context>) {
        debug!("Device left: {:?}", device);
        self.send(HotplugEvent::Left {
            bus_number: device.bus_number(),
            address: device.address(),
        });
    }
}
