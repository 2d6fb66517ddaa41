use super::*;

#[test]
fn scan_error_display_messages() {
    assert!(ScanError::Input("bad path".into()).to_string().contains("bad path"));
    assert!(ScanError::Internal("invariant".into()).to_string().contains("invariant"));
    assert_eq!(ScanError::Cancelled.to_string(), "scan cancelled");

    let protocol = ScanError::Protocol { status: 404, message: "unknown session".into() };
    let msg = protocol.to_string();
    assert!(msg.contains("404"));
    assert!(msg.contains("unknown session"));
}

#[test]
fn scan_error_io_variant_wraps_std_io_error() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err: ScanError = io_err.into();
    assert!(matches!(err, ScanError::Io(_)));
}

#[test]
fn scan_error_clone_preserves_io_message_and_kind() {
    let original = ScanError::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"));
    let cloned = original.clone();
    match (&original, &cloned) {
        (ScanError::Io(a), ScanError::Io(b)) => {
            assert_eq!(a.kind(), b.kind());
            assert_eq!(a.to_string(), b.to_string());
        }
        _ => panic!("expected Io variant"),
    }
}

#[test]
fn scan_error_clone_preserves_protocol_fields() {
    let original = ScanError::Protocol { status: 409, message: "already running".into() };
    let cloned = original.clone();
    match cloned {
        ScanError::Protocol { status, message } => {
            assert_eq!(status, 409);
            assert_eq!(message, "already running");
        }
        _ => panic!("expected Protocol variant"),
    }
}
