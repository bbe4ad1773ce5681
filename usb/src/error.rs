use crate::transport::TransportState;
use strum::Display;

/// The broad classification of a [`SensorError`].
///
/// Callers that only care whether a failure is "the hardware isn't there / didn't cooperate"
/// versus "the transport was driven in the wrong order" should match on this rather than on
/// individual variants.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum ErrorKind {
    Internal,
    InvalidState,
    Cancelled,
}

#[derive(thiserror::Error, Debug)]
pub enum SensorError {
    #[error("No device matching {vendor_id:04x}:{product_id:04x} was found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("Unable to select configuration {configuration}: {source}")]
    DeviceNotConfigured {
        configuration: u8,
        #[source]
        source: rusb::Error,
    },

    #[error("Unable to claim interface {interface}: {source}")]
    DeviceNotClaimed {
        interface: u8,
        #[source]
        source: rusb::Error,
    },

    #[error("USB error: {0}")]
    UsbError(#[from] rusb::Error),

    #[error("Hotplug notifications are not supported on this platform")]
    HotplugUnsupported,

    #[error("Malformed response from sensor, expected {expected} bytes, received {received}")]
    MalformedResponse { expected: usize, received: usize },

    #[error("Event context failure: {0}")]
    Context(String),

    #[error("Transfer task failed: {0}")]
    TransferFailed(#[from] tokio::task::JoinError),

    #[error("Cannot {operation} while the transport is {state}")]
    InvalidState {
        operation: &'static str,
        state: TransportState,
    },

    #[error("No device is connected")]
    NotConnected,

    #[error("A device is already connected")]
    AlreadyConnected,

    #[error("Transfer was cancelled by a disconnect")]
    Cancelled,
}

impl SensorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SensorError::InvalidState { .. }
            | SensorError::NotConnected
            | SensorError::AlreadyConnected => ErrorKind::InvalidState,
            SensorError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Internal,
        }
    }
}

pub type Result<T, E = SensorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_is_internal() {
        let error = SensorError::DeviceNotFound {
            vendor_id: 0xffff,
            product_id: 0xffff,
        };
        assert_eq!(error.kind(), ErrorKind::Internal);
        assert_eq!(
            error.to_string(),
            "No device matching ffff:ffff was found"
        );
    }

    #[test]
    fn claim_and_configuration_failures_are_internal() {
        let claim = SensorError::DeviceNotClaimed {
            interface: 1,
            source: rusb::Error::Busy,
        };
        let config = SensorError::DeviceNotConfigured {
            configuration: 1,
            source: rusb::Error::NotSupported,
        };
        assert_eq!(claim.kind(), ErrorKind::Internal);
        assert_eq!(config.kind(), ErrorKind::Internal);
    }

    #[test]
    fn ordering_errors_are_distinguishable() {
        let error = SensorError::InvalidState {
            operation: "connect",
            state: TransportState::Loaded,
        };
        assert_eq!(error.kind(), ErrorKind::InvalidState);
        assert_eq!(
            error.to_string(),
            "Cannot connect while the transport is Loaded"
        );
        assert_eq!(SensorError::Cancelled.kind(), ErrorKind::Cancelled);
    }
}
