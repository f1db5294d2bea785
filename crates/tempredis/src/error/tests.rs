//! Unit tests for supervisor error types.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;

use super::*;

#[test]
fn timeout_message_includes_duration_and_last_line() {
    let error = ServerError::ReadinessTimeout {
        timeout: Duration::from_millis(1500),
        last_line: String::from("Server initialized"),
    };
    let message = error.to_string();
    assert!(message.contains("1500ms"), "expected timeout in message: {message}");
    assert!(
        message.contains("Server initialized"),
        "expected last line in message: {message}"
    );
}

#[test]
fn stream_ended_exposes_read_error_as_source() {
    let error = ServerError::ReadinessStreamEnded {
        last_line: String::new(),
        source: Some(Arc::new(io::Error::other("broken pipe"))),
    };
    let source = std::error::Error::source(&error).expect("source should be present");
    assert!(source.to_string().contains("broken pipe"));
}

#[rstest]
#[case::already_running(ServerError::AlreadyRunning { pid: 4242 }, "4242")]
#[case::not_running(ServerError::NotRunning, "not running")]
#[case::stopped(ServerError::AlreadyStopped, "new handle")]
#[case::binary(
    ServerError::Launch(LaunchError::BinaryNotFound {
        binary: PathBuf::from("/opt/missing/redis-server"),
        source: Arc::new(io::Error::from(io::ErrorKind::NotFound)),
    }),
    "/opt/missing/redis-server"
)]
#[case::pipe(
    ServerError::Launch(LaunchError::MissingPipe { stream: "stdout" }),
    "stdout"
)]
#[case::invalid_config(
    ServerError::Launch(LaunchError::InvalidConfig(WireEncodeError::LineBreakInValue {
        key: String::from("dir"),
    })),
    "'dir' contains a line break"
)]
#[case::port(
    ServerError::Allocation(AllocationError::EphemeralPort {
        bind: String::from("10.255.255.1"),
        source: Arc::new(io::Error::from(io::ErrorKind::AddrNotAvailable)),
    }),
    "10.255.255.1"
)]
#[case::termination(
    ServerError::Termination {
        pid: 77,
        signal: StopSignal::Terminate,
        source: Arc::new(io::Error::from(io::ErrorKind::PermissionDenied)),
    },
    "terminate server pid 77"
)]
fn error_message_includes_context(#[case] error: ServerError, #[case] expected: &str) {
    let message = error.to_string();
    assert!(
        message.contains(expected),
        "expected {expected:?} in message: {message}"
    );
}

#[test]
fn server_error_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ServerError>();
}
