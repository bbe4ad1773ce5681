pub mod handle;
pub mod hotplug;

pub use handle::{SensorDescriptor, SensorHandle};
pub use hotplug::HotplugEvent;
