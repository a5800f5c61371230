//! Tests for error types.

use super::*;

#[test]
fn test_error_transience() {
    assert!(TransportError::ServerUnavailable {
        status: 503,
        message: "unavailable".to_string(),
    }
    .is_transient());

    assert!(TransportError::Timeout {
        timeout: Duration::from_secs(10),
    }
    .is_transient());

    assert!(TransportError::ConnectionFailed {
        message: "connection refused".to_string(),
    }
    .is_transient());

    assert!(!TransportError::Rejected {
        status: 400,
        message: "bad request".to_string(),
    }
    .is_transient());

    assert!(!TransportError::Destroyed.is_transient());
    assert!(!TransportError::InvalidRequest {
        message: "relative URL without a base".to_string(),
    }
    .should_retry());
}

#[test]
fn test_storage_error_transience_propagates() {
    let io = TransportError::from(StorageError::Io {
        message: "disk full".to_string(),
    });
    assert!(io.is_transient());

    let corrupt = TransportError::from(StorageError::Corrupt {
        message: "expected value at line 1".to_string(),
    });
    assert!(!corrupt.is_transient());
}

#[test]
fn test_io_error_converts_to_storage_error() {
    let err: StorageError =
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
    assert!(matches!(err, StorageError::Io { ref message } if message.contains("denied")));
}

#[test]
fn test_error_display_includes_status() {
    let err = TransportError::Rejected {
        status: 401,
        message: "invalid api key".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Delivery rejected with status 401: invalid api key"
    );
}

#[test]
fn test_config_error_is_terminal() {
    let err = TransportError::from(ConfigError::Missing {
        key: "endpoint".to_string(),
    });

    assert!(!err.is_transient());
    assert_eq!(
        err.to_string(),
        "Configuration error: Missing required configuration: endpoint"
    );
}
