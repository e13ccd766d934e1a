use crate::core::action::{Action, Operation};
use crate::core::protocol::response::{Completed, ConnectionStatus};
use crate::core::protocol::{
    Cid, ClientHandle, DeviceHandle, DeviceRequest, OpenFlags, ProtocolError, QmiBackend,
    ReleasePolicy, Response, Service, ServiceRequest, WdsRequest,
};
use crate::core::session::{CancelHandle, DispatchState, Session};
use crate::domain::config::GlobalConfig;
use crate::domain::error::{QmiCtlError, QmiCtlResult};
use crate::domain::values::StartNetworkInput;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const TRANSPORT_FAILURE: &str = "operation failed";

/// Knobs applied to a single dispatch.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub open_timeout: Duration,
    /// Timeout for client allocation and release
    pub client_timeout: Duration,
    pub request_timeout: Duration,
    pub follow_interval: Duration,
    pub open_flags: OpenFlags,
    /// Reuse this client instead of allocating a new one
    pub cid: Option<Cid>,
    pub release_policy: ReleasePolicy,
}

impl DispatchSettings {
    pub fn from_config(global: &GlobalConfig) -> Self {
        Self {
            open_timeout: global.open_timeout(),
            client_timeout: global.release_timeout(),
            request_timeout: global.request_timeout(),
            follow_interval: global.follow_interval(),
            open_flags: OpenFlags::default(),
            cid: None,
            release_policy: ReleasePolicy::Release,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&GlobalConfig::default())
    }
}

/// Intermediate events of a long running action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    NetworkStarted {
        packet_data_handle: u32,
        /// The network stays up until cancelled
        follow: bool,
    },
    ConnectionStatus {
        status: ConnectionStatus,
        /// Set when the status ends the follow loop
        stopping: bool,
    },
    NetworkCancelled,
    PollFailed {
        error: String,
        message: String,
    },
}

/// What happened to the service client at the end of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientDisposition {
    Released,
    Retained,
    ReleaseFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientReport {
    pub service: Service,
    pub cid: Cid,
    pub disposition: ClientDisposition,
}

/// Result of a dispatch, ready to be rendered.
#[derive(Debug)]
pub struct Outcome {
    pub device: String,
    pub result: QmiCtlResult<Response>,
    pub client: Option<ClientReport>,
    pub transitions: Vec<DispatchState>,
}

impl Outcome {
    /// A failed release never turns a successful action into a failure.
    pub fn success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn exit_code(&self) -> u8 {
        if self.success() {
            0
        } else {
            1
        }
    }
}

/// Drives one action through open, allocate, act and release.
pub struct Dispatcher {
    backend: Arc<dyn QmiBackend>,
    settings: DispatchSettings,
    progress: Option<mpsc::UnboundedSender<Progress>>,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn QmiBackend>, settings: DispatchSettings) -> Self {
        Self {
            backend,
            settings,
            progress: None,
        }
    }

    /// Forward intermediate events to `sender`.
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<Progress>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub async fn run(&self, path: &Path, action: &Action, cancel: &CancelHandle) -> Outcome {
        let device_path = path.display().to_string();
        let mut session = Session::new(device_path.clone(), cancel.clone());
        info!(
            "dispatching '{}' on {} via {} backend",
            action.flag_name(),
            device_path,
            self.backend.name()
        );

        session.transition(DispatchState::DeviceOpening);
        let device = match self
            .backend
            .open(
                path,
                &self.settings.open_flags,
                self.settings.open_timeout,
                session.token(),
            )
            .await
        {
            Ok(device) => device,
            Err(source) => {
                warn!("couldn't open {}: {}", device_path, source);
                return Outcome {
                    device: device_path.clone(),
                    result: Err(QmiCtlError::Connection {
                        device: device_path,
                        source,
                    }),
                    client: None,
                    transitions: session.finish(),
                };
            }
        };
        debug!("device {} open (id {})", device.display(), device.id());

        let (result, client) = match action {
            Action::Device(request) => {
                session.transition(DispatchState::ActionInFlight);
                let result = self.device_request(&device, request, session.token()).await;
                (result, None)
            }
            Action::Service { service, operation } => {
                self.run_with_client(&mut session, &device, *service, operation)
                    .await
            }
        };

        Outcome {
            device: device_path,
            result,
            client,
            transitions: session.finish(),
        }
    }

    async fn run_with_client(
        &self,
        session: &mut Session,
        device: &DeviceHandle,
        service: Service,
        operation: &Operation,
    ) -> (QmiCtlResult<Response>, Option<ClientReport>) {
        session.transition(DispatchState::ClientAllocating);
        let client = match self
            .backend
            .allocate_client(
                device,
                service,
                self.settings.cid,
                self.settings.client_timeout,
                session.token(),
            )
            .await
        {
            Ok(client) => client,
            Err(source) => {
                warn!("couldn't allocate {} client: {}", service, source);
                return (Err(QmiCtlError::Allocation { service, source }), None);
            }
        };
        debug!("{} client ready (cid {})", service, client.cid());
        session.attach_client(client);

        session.transition(DispatchState::ActionInFlight);
        let result = match session.client() {
            Some(client) => {
                self.perform(device, client, operation, session.token())
                    .await
            }
            None => Err(QmiCtlError::Action {
                context: TRANSPORT_FAILURE.to_string(),
                source: ProtocolError::Transport("client handle missing".to_string()),
            }),
        };

        let report = self.finish_client(session, device).await;
        (result, report)
    }

    /// Release or retain the client. Runs on every path out of the action.
    async fn finish_client(
        &self,
        session: &mut Session,
        device: &DeviceHandle,
    ) -> Option<ClientReport> {
        let client = session.take_client()?;
        let service = client.service();
        let cid = client.cid();

        let disposition = match self.settings.release_policy {
            ReleasePolicy::Retain => {
                info!("retaining {} client with cid {}", service, cid);
                ClientDisposition::Retained
            }
            ReleasePolicy::Release => {
                session.transition(DispatchState::ReleasingClient);
                // Not cancellable: the token may already be cancelled here.
                match self
                    .backend
                    .release_client(device, client, self.settings.client_timeout)
                    .await
                {
                    Ok(()) => {
                        debug!("{} client with cid {} released", service, cid);
                        ClientDisposition::Released
                    }
                    Err(source) => {
                        let err = QmiCtlError::Release { source };
                        warn!("{}", err);
                        ClientDisposition::ReleaseFailed(err.to_string())
                    }
                }
            }
        };

        Some(ClientReport {
            service,
            cid,
            disposition,
        })
    }

    async fn device_request(
        &self,
        device: &DeviceHandle,
        request: &DeviceRequest,
        token: &CancellationToken,
    ) -> QmiCtlResult<Response> {
        self.backend
            .device_request(device, request, self.settings.request_timeout, token)
            .await
            .map_err(|source| action_error(request.failure_context(), source))
    }

    async fn perform(
        &self,
        device: &DeviceHandle,
        client: &ClientHandle,
        operation: &Operation,
        token: &CancellationToken,
    ) -> QmiCtlResult<Response> {
        match operation {
            Operation::Noop => {
                debug!("no request issued for {} noop", client.service());
                Ok(Response::Completed(Completed::new("No operation performed")))
            }
            Operation::Request(request) => {
                self.client_request(device, client, request, token).await
            }
            Operation::FollowNetwork(input) => {
                self.follow_network(device, client, input, token).await
            }
        }
    }

    async fn client_request(
        &self,
        device: &DeviceHandle,
        client: &ClientHandle,
        request: &ServiceRequest,
        token: &CancellationToken,
    ) -> QmiCtlResult<Response> {
        self.backend
            .client_request(
                device,
                client,
                request,
                request.timeout(self.settings.request_timeout),
                token,
            )
            .await
            .map_err(|source| action_error(request.failure_context(), source))
    }

    async fn start_network(
        &self,
        device: &DeviceHandle,
        client: &ClientHandle,
        request: &ServiceRequest,
        token: &CancellationToken,
    ) -> QmiCtlResult<u32> {
        match self.client_request(device, client, request, token).await? {
            Response::NetworkStarted(started) => Ok(started.packet_data_handle),
            other => Err(QmiCtlError::Action {
                context: TRANSPORT_FAILURE.to_string(),
                source: ProtocolError::Transport(format!(
                    "unexpected reply to start network: {}",
                    other.headline()
                )),
            }),
        }
    }

    /// Start the network, poll its status until cancelled or disconnected,
    /// then stop it.
    async fn follow_network(
        &self,
        device: &DeviceHandle,
        client: &ClientHandle,
        input: &StartNetworkInput,
        token: &CancellationToken,
    ) -> QmiCtlResult<Response> {
        let start = ServiceRequest::Wds(WdsRequest::StartNetwork(input.clone()));
        let handle = self.start_network(device, client, &start, token).await?;
        info!("network started with packet data handle {}", handle);
        self.emit(Progress::NetworkStarted {
            packet_data_handle: handle,
            follow: true,
        });

        let status_request = ServiceRequest::Wds(WdsRequest::GetPacketServiceStatus);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    self.emit(Progress::NetworkCancelled);
                    break;
                }
                _ = tokio::time::sleep(self.settings.follow_interval) => {}
            }

            match self
                .backend
                .client_request(
                    device,
                    client,
                    &status_request,
                    self.settings.request_timeout,
                    token,
                )
                .await
            {
                Ok(Response::PacketServiceStatus(status)) => {
                    let stopping = status.connection_status != ConnectionStatus::Connected;
                    self.emit(Progress::ConnectionStatus {
                        status: status.connection_status,
                        stopping,
                    });
                    if stopping {
                        info!("stopping after detecting disconnection");
                        break;
                    }
                }
                Ok(other) => self.emit(Progress::PollFailed {
                    error: TRANSPORT_FAILURE.to_string(),
                    message: format!("unexpected reply: {}", other.headline()),
                }),
                Err(ProtocolError::Cancelled) => {
                    self.emit(Progress::NetworkCancelled);
                    break;
                }
                Err(source) => {
                    let err = action_error(status_request.failure_context(), source);
                    warn!("{}", err);
                    self.emit(Progress::PollFailed {
                        error: err.headline(),
                        message: err.detail().unwrap_or_default(),
                    });
                }
            }
        }

        // Stop with a fresh token so a pending cancellation can't abort it.
        let stop = ServiceRequest::Wds(WdsRequest::StopNetwork(handle));
        self.client_request(device, client, &stop, &CancellationToken::new())
            .await?;
        info!("network stopped");
        Ok(Response::Completed(Completed::new("network stopped")))
    }

    fn emit(&self, progress: Progress) {
        if let Some(sender) = &self.progress {
            if sender.send(progress).is_err() {
                debug!("progress receiver dropped");
            }
        }
    }
}

/// Protocol errors carry the action's own headline; anything else means the
/// request never completed.
fn action_error(context: &str, source: ProtocolError) -> QmiCtlError {
    let context = if source.is_response() {
        context
    } else {
        TRANSPORT_FAILURE
    };
    QmiCtlError::Action {
        context: context.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::QmiStatus;

    #[test]
    fn test_action_error_context() {
        let err = action_error(
            "couldn't get IDs",
            ProtocolError::response(QmiStatus::internal()),
        );
        assert_eq!(err.headline(), "couldn't get IDs");

        let err = action_error("couldn't get IDs", ProtocolError::Cancelled);
        assert_eq!(err.headline(), "operation failed");
        assert_eq!(err.detail().as_deref(), Some("operation cancelled"));
    }

    #[test]
    fn test_settings_from_config() {
        let settings = DispatchSettings::default();
        assert_eq!(settings.open_timeout, Duration::from_secs(15));
        assert_eq!(settings.client_timeout, Duration::from_secs(10));
        assert_eq!(settings.follow_interval, Duration::from_secs(20));
        assert_eq!(settings.release_policy, ReleasePolicy::Release);
        assert!(settings.cid.is_none());
    }
}
