use colorsense_usb::{ErrorKind, RuntimeContext, SensorError, Transport, TransportState};
use std::sync::Arc;

#[test]
fn connect_to_missing_device() {
    let mut transport = Transport::new();
    assert!(!transport.get_connected());
    assert!(transport.get_device_handle().is_none());

    transport.load().expect("USB subsystem should load");
    assert_eq!(transport.state(), TransportState::Loaded);

    // Attach to the default event loop.
    transport
        .attach_to_context(None)
        .expect("attaching to the default context should succeed");
    assert_eq!(transport.state(), TransportState::Attached);
    assert_eq!(transport.context_name(), Some("default"));

    // Nothing real will ever answer to ffff:ffff.
    let error = transport.connect(0xffff, 0xffff, 0x1, 0x1).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Internal);
    assert!(matches!(
        error,
        SensorError::DeviceNotFound {
            vendor_id: 0xffff,
            product_id: 0xffff
        }
    ));

    assert!(!transport.get_connected());
    assert!(transport.get_device_handle().is_none());
    assert_eq!(transport.get_connected(), transport.get_connected());

    // The failed attempt leaves the transport usable.
    let error = transport.connect(0xffff, 0xffff, 0x1, 0x1).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Internal);
}

#[test]
fn lifecycle_steps_only_run_once() {
    let mut transport = Transport::new();
    transport.load().expect("USB subsystem should load");

    let error = transport.load().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidState);
    assert_eq!(transport.state(), TransportState::Loaded);

    transport.attach_to_context(None).expect("attach");
    let error = transport.attach_to_context(None).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidState);
    assert_eq!(transport.state(), TransportState::Attached);
}

#[tokio::test]
async fn attach_to_caller_runtime() {
    let mut transport = Transport::new();
    transport.load().expect("USB subsystem should load");

    let context = RuntimeContext::current().expect("inside a runtime");
    transport
        .attach_to_context(Some(Arc::new(context)))
        .expect("attaching to the caller's runtime should succeed");
    assert_eq!(transport.context_name(), Some("current"));

    let error = transport.connect(0xffff, 0xffff, 0x1, 0x1).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Internal);
    assert!(!transport.get_connected());

    transport.disconnect();
    assert!(!transport.get_connected());
}
