// Protocol module - Boundary to the QMI protocol library
pub mod request;
pub mod response;
pub mod types;

pub use request::{
    DeviceRequest, DmsRequest, NasRequest, PbmRequest, ServiceRequest, UimRequest, WdsRequest,
};
pub use response::Response;
pub use types::{
    Cid, ClientHandle, DeviceHandle, LinkProtocol, NetOpenFlags, OpenFlags, ReleasePolicy, Service,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Status code carried in a QMI response when the device rejects a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QmiStatus {
    pub code: u16,
    pub name: String,
}

impl QmiStatus {
    pub fn new(code: u16, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
        }
    }

    pub fn internal() -> Self {
        Self::new(3, "Internal")
    }

    pub fn client_ids_exhausted() -> Self {
        Self::new(5, "ClientIdsExhausted")
    }

    pub fn call_failed() -> Self {
        Self::new(14, "CallFailed")
    }

    pub fn no_effect() -> Self {
        Self::new(26, "NoEffect")
    }

    pub fn invalid_client_id() -> Self {
        Self::new(7, "InvalidClientId")
    }

    pub fn info_unavailable() -> Self {
        Self::new(74, "InfoUnavailable")
    }

    pub fn not_supported() -> Self {
        Self::new(94, "NotSupported")
    }
}

/// Why a data call could not be brought up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEndReason {
    pub code: u16,
    pub text: String,
    pub verbose_type: Option<String>,
    pub verbose_reason: Option<i16>,
}

/// Errors reported by a protocol backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("service '{0}' is not supported by the device")]
    UnsupportedService(Service),

    #[error("QMI protocol error ({}): '{}'", .status.code, .status.name)]
    Response {
        status: QmiStatus,
        call_end_reason: Option<CallEndReason>,
    },
}

impl ProtocolError {
    pub fn response(status: QmiStatus) -> Self {
        Self::Response {
            status,
            call_end_reason: None,
        }
    }

    /// True when the device answered and rejected the request, as opposed to
    /// the request never completing.
    pub fn is_response(&self) -> bool {
        matches!(self, ProtocolError::Response { .. })
    }

    pub fn call_end_reason(&self) -> Option<&CallEndReason> {
        match self {
            ProtocolError::Response {
                call_end_reason, ..
            } => call_end_reason.as_ref(),
            _ => None,
        }
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Asynchronous operations provided by a QMI protocol library.
///
/// Every call suspends until the library reports completion. Calls taking a
/// cancellation token must observe it and answer with
/// [`ProtocolError::Cancelled`]; nothing is aborted from the outside.
#[async_trait]
pub trait QmiBackend: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this backend knows how to open the given device path.
    fn handles(&self, path: &Path) -> bool;

    /// Open the device.
    async fn open(
        &self,
        path: &Path,
        flags: &OpenFlags,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ProtocolResult<DeviceHandle>;

    /// Allocate a client for `service`, or adopt `cid` when given.
    async fn allocate_client(
        &self,
        device: &DeviceHandle,
        service: Service,
        cid: Option<Cid>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ProtocolResult<ClientHandle>;

    /// Release the client and its CID. Not cancellable.
    async fn release_client(
        &self,
        device: &DeviceHandle,
        client: ClientHandle,
        timeout: Duration,
    ) -> ProtocolResult<()>;

    /// Issue a request handled by the device itself.
    async fn device_request(
        &self,
        device: &DeviceHandle,
        request: &DeviceRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ProtocolResult<Response>;

    /// Issue a request through an allocated client.
    async fn client_request(
        &self,
        device: &DeviceHandle,
        client: &ClientHandle,
        request: &ServiceRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ProtocolResult<Response>;
}

/// Backends available to this process, searched in registration order.
pub struct BackendRegistry {
    backends: Vec<Arc<dyn QmiBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    pub fn register_backend(&mut self, backend: Arc<dyn QmiBackend>) {
        self.backends.push(backend);
    }

    /// First backend able to open `path`.
    pub fn resolve(&self, path: &Path) -> Option<Arc<dyn QmiBackend>> {
        self.backends
            .iter()
            .find(|backend| backend.handles(path))
            .cloned()
    }

    pub fn available_backends(&self) -> Vec<&'static str> {
        self.backends.iter().map(|backend| backend.name()).collect()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
