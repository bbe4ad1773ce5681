pub use rusb;
pub mod buffer;
pub mod calibration;
pub mod context;
pub mod device;
pub mod error;
pub mod math;
pub mod register;
pub mod transport;

pub use calibration::Calibration;
pub use context::{DefaultContext, EventContext, RuntimeContext};
pub use device::{HotplugEvent, SensorDescriptor, SensorHandle};
pub use error::{ErrorKind, SensorError};
pub use math::{Mat3x3, Vec3};
pub use transport::{Transport, TransportState};
