use qmictl::core::protocol::{
    CallEndReason, DmsRequest, ProtocolError, QmiStatus, Service, ServiceRequest,
};
use qmictl::core::{Action, CancelHandle, DispatchSettings, Dispatcher};
use qmictl::infrastructure::config::ConfigManager;
use qmictl::infrastructure::emulator::EmulatorBackend;
use qmictl::QmiCtlError;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

// Error handling tests

fn profile(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("Failed to create profile");
    file.write_all(content.as_bytes())
        .expect("Failed to write profile");
    file
}

#[test]
fn test_error_display() {
    let error = QmiCtlError::configuration("no actions specified");
    assert!(error.to_string().contains("Configuration error"));
    assert_eq!(error.headline(), "no actions specified");
    assert!(error.detail().is_none());
    assert!(error.is_configuration());

    let error = QmiCtlError::Allocation {
        service: Service::Uim,
        source: ProtocolError::UnsupportedService(Service::Uim),
    };
    assert_eq!(error.headline(), "couldn't create client for the service");
    assert!(error.detail().unwrap().contains("'uim'"));
    assert!(!error.is_configuration());
}

#[test]
fn test_call_end_reason_is_exposed() {
    let error = QmiCtlError::Action {
        context: "couldn't start network".to_string(),
        source: ProtocolError::Response {
            status: QmiStatus::call_failed(),
            call_end_reason: Some(CallEndReason {
                code: 1000,
                text: "activation-in-progress".to_string(),
                verbose_type: Some("internal".to_string()),
                verbose_reason: Some(201),
            }),
        },
    };
    assert_eq!(error.headline(), "couldn't start network");
    assert_eq!(error.call_end_reason().map(|reason| reason.code), Some(1000));
}

#[test]
fn test_broken_config_is_a_configuration_error() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"[global]\nopen_timeout_secs = \"soon\"\n").unwrap();

    let err = ConfigManager::with_explicit_path(file.path())
        .load_config()
        .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_missing_explicit_config_fails() {
    let err = ConfigManager::with_explicit_path("/nonexistent/qmictl/config.toml")
        .load_config();
    assert!(err.is_err());
}

#[tokio::test]
async fn test_open_timeout_is_a_connection_error() {
    let file = profile("[device]\nlatency_ms = 500\n");
    let settings = DispatchSettings {
        open_timeout: Duration::from_millis(20),
        ..DispatchSettings::default()
    };
    let outcome = Dispatcher::new(Arc::new(EmulatorBackend::new()), settings)
        .run(file.path(), &Action::noop(Service::Dms), &CancelHandle::new())
        .await;

    match &outcome.result {
        Err(QmiCtlError::Connection { source, .. }) => {
            assert_eq!(*source, ProtocolError::Timeout(Duration::from_millis(20)))
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(outcome.exit_code(), 1);
}

#[tokio::test]
async fn test_request_timeout_is_operation_failed() {
    let file = profile("[device]\nlatency_ms = 50\n[dms.ids]\nimei = \"1\"\n");
    let settings = DispatchSettings {
        request_timeout: Duration::from_millis(10),
        ..DispatchSettings::default()
    };
    let action = Action::request(ServiceRequest::Dms(DmsRequest::GetIds));
    let outcome = Dispatcher::new(Arc::new(EmulatorBackend::new()), settings)
        .run(file.path(), &action, &CancelHandle::new())
        .await;

    let err = outcome.result.unwrap_err();
    assert_eq!(err.headline(), "operation failed");
    assert!(err.detail().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_release_fault_does_not_fail_action() {
    let file = profile(
        "[dms.ids]\nimei = \"1\"\n[faults.\"client-release\"]\ntransport = \"endpoint hung up\"\n",
    );
    let action = Action::request(ServiceRequest::Dms(DmsRequest::GetIds));
    let outcome = Dispatcher::new(
        Arc::new(EmulatorBackend::new()),
        DispatchSettings::default(),
    )
    .run(file.path(), &action, &CancelHandle::new())
    .await;

    assert!(outcome.success());
    assert_eq!(outcome.exit_code(), 0);
    match outcome.client.map(|client| client.disposition) {
        Some(qmictl::core::ClientDisposition::ReleaseFailed(message)) => {
            assert!(message.contains("endpoint hung up"))
        }
        other => panic!("unexpected disposition {:?}", other),
    }
}

#[tokio::test]
async fn test_allocation_fault() {
    let file = profile("[faults.\"client-allocate\"]\ncode = 5\nname = \"ClientIdsExhausted\"\n");
    let outcome = Dispatcher::new(
        Arc::new(EmulatorBackend::new()),
        DispatchSettings::default(),
    )
    .run(file.path(), &Action::noop(Service::Nas), &CancelHandle::new())
    .await;

    let err = outcome.result.unwrap_err();
    assert_eq!(err.headline(), "couldn't create client for the service");
    assert!(err.detail().unwrap().contains("ClientIdsExhausted"));
    assert!(outcome.client.is_none());
}
