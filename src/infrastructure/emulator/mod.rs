// Emulator module - QMI backend answering from a TOML device profile
pub mod profile;

pub use profile::DeviceProfile;

use crate::core::protocol::response::{
    Completed, ConnectionStatus, InstanceIdSet, NetworkStarted, OperatingModeState,
    PacketServiceStatus, ServiceVersionInfo, SystemSelectionPreference,
};
use crate::core::protocol::{
    Cid, ClientHandle, DeviceHandle, DeviceRequest, DmsRequest, NasRequest, OpenFlags, PbmRequest,
    ProtocolError, ProtocolResult, QmiBackend, QmiStatus, Response, Service, ServiceRequest,
    UimRequest, WdsRequest,
};
use async_trait::async_trait;
use profile::{ALLOCATE_FAULT, RELEASE_FAULT};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const DEFAULT_PACKET_DATA_HANDLE: u32 = 0x0A1B_2C3D;

/// Live state of one emulated data session.
#[derive(Debug, Clone, Copy)]
struct NetworkState {
    packet_data_handle: u32,
    polls: u32,
}

/// One opened emulated device.
struct EmulatedDevice {
    profile: DeviceProfile,
    clients: HashSet<(Service, u8)>,
    network: Option<NetworkState>,
}

impl EmulatedDevice {
    fn new(profile: DeviceProfile) -> Self {
        Self {
            profile,
            clients: HashSet::new(),
            network: None,
        }
    }

    fn next_cid(&self, service: Service) -> Option<Cid> {
        (1..=u8::MAX)
            .find(|cid| !self.clients.contains(&(service, *cid)))
            .and_then(Cid::new)
    }
}

/// Backend serving device paths that end in `.toml`.
pub struct EmulatorBackend {
    next_device_id: AtomicU64,
    devices: Mutex<HashMap<u64, EmulatedDevice>>,
}

impl EmulatorBackend {
    pub fn new() -> Self {
        Self {
            next_device_id: AtomicU64::new(1),
            devices: Mutex::new(HashMap::new()),
        }
    }

    /// CIDs currently allocated on `device` for `service`.
    pub async fn allocated_cids(&self, device: &DeviceHandle, service: Service) -> Vec<u8> {
        let devices = self.devices.lock().await;
        let mut cids: Vec<u8> = devices
            .get(&device.id())
            .map(|state| {
                state
                    .clients
                    .iter()
                    .filter(|(s, _)| *s == service)
                    .map(|(_, cid)| *cid)
                    .collect()
            })
            .unwrap_or_default();
        cids.sort_unstable();
        cids
    }

    async fn latency(&self, device: &DeviceHandle) -> ProtocolResult<Duration> {
        let devices = self.devices.lock().await;
        devices
            .get(&device.id())
            .map(|state| state.profile.device.latency())
            .ok_or_else(|| ProtocolError::Transport("device is not open".to_string()))
    }

    /// Run `f` on the device state after the simulated round trip.
    async fn respond<T>(
        &self,
        device: &DeviceHandle,
        timeout: Duration,
        cancel: &CancellationToken,
        f: impl FnOnce(&mut EmulatedDevice) -> ProtocolResult<T>,
    ) -> ProtocolResult<T> {
        let latency = self.latency(device).await?;
        round_trip(latency, timeout, cancel).await?;

        let mut devices = self.devices.lock().await;
        let state = devices
            .get_mut(&device.id())
            .ok_or_else(|| ProtocolError::Transport("device is not open".to_string()))?;
        f(state)
    }
}

impl Default for EmulatorBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for the simulated reply, honouring the timeout and cancellation.
async fn round_trip(
    latency: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> ProtocolResult<()> {
    let (wait, result) = if latency > timeout {
        (timeout, Err(ProtocolError::Timeout(timeout)))
    } else {
        (latency, Ok(()))
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProtocolError::Cancelled),
        _ = tokio::time::sleep(wait) => result,
    }
}

fn unavailable() -> ProtocolError {
    ProtocolError::response(QmiStatus::info_unavailable())
}

fn reply<T: Clone>(value: &Option<T>, wrap: fn(T) -> Response) -> ProtocolResult<Response> {
    value.clone().map(wrap).ok_or_else(unavailable)
}

fn completed(message: &str) -> ProtocolResult<Response> {
    Ok(Response::Completed(Completed::new(message)))
}

fn dms(state: &mut EmulatedDevice, request: &DmsRequest) -> ProtocolResult<Response> {
    let replies = &mut state.profile.dms;
    match request {
        DmsRequest::GetIds => reply(&replies.ids, Response::DeviceIds),
        DmsRequest::GetCapabilities => reply(&replies.capabilities, Response::DeviceCapabilities),
        DmsRequest::GetOperatingMode => reply(&replies.operating_mode, Response::OperatingMode),
        DmsRequest::SetOperatingMode(mode) => {
            let current = replies.operating_mode.get_or_insert(OperatingModeState {
                mode: *mode,
                hardware_restricted: None,
                offline_reason: None,
            });
            current.mode = *mode;
            completed("Operating mode set successfully")
        }
        DmsRequest::Reset => completed("Successfully performed DMS service reset"),
    }
}

fn nas(state: &mut EmulatedDevice, request: &NasRequest) -> ProtocolResult<Response> {
    let replies = &mut state.profile.nas;
    match request {
        NasRequest::GetSignalStrength => reply(&replies.signal_strength, Response::SignalStrength),
        NasRequest::GetSignalInfo => reply(&replies.signal_info, Response::SignalInfo),
        NasRequest::GetTxRxInfo(radio_interface) => replies
            .tx_rx_info(*radio_interface)
            .cloned()
            .map(Response::TxRxInfo)
            .ok_or_else(unavailable),
        NasRequest::GetHomeNetwork => reply(&replies.home_network, Response::HomeNetwork),
        NasRequest::GetServingSystem => reply(&replies.serving_system, Response::ServingSystem),
        NasRequest::GetSystemInfo => reply(&replies.system_info, Response::SystemInfo),
        NasRequest::GetTechnologyPreference => {
            reply(&replies.technology_preference, Response::TechnologyPreference)
        }
        NasRequest::GetSystemSelectionPreference => reply(
            &replies.system_selection_preference,
            Response::SystemSelectionPreference,
        ),
        NasRequest::SetSystemSelectionPreference(modes) => {
            let current = replies
                .system_selection_preference
                .get_or_insert(SystemSelectionPreference {
                    emergency_mode: None,
                    mode_preference: None,
                    band_preference: None,
                    lte_band_preference: None,
                    roaming_preference: None,
                    network_selection_preference: None,
                    service_domain_preference: None,
                });
            current.mode_preference = Some(modes.clone());
            completed("System selection preference set successfully; replug your device.")
        }
        NasRequest::NetworkScan => reply(&replies.network_scan, Response::NetworkScan),
        NasRequest::Reset => completed("Successfully performed NAS service reset"),
    }
}

fn wds(state: &mut EmulatedDevice, request: &WdsRequest) -> ProtocolResult<Response> {
    let replies = &state.profile.wds;
    match request {
        WdsRequest::StartNetwork(input) => {
            if state.network.is_some() {
                return Err(ProtocolError::response(QmiStatus::no_effect()));
            }
            let packet_data_handle = replies
                .packet_data_handle
                .unwrap_or(DEFAULT_PACKET_DATA_HANDLE);
            debug!(
                "emulated network up on apn '{}' (handle {})",
                input.apn.as_deref().unwrap_or_default(),
                packet_data_handle
            );
            state.network = Some(NetworkState {
                packet_data_handle,
                polls: 0,
            });
            Ok(Response::NetworkStarted(NetworkStarted { packet_data_handle }))
        }
        WdsRequest::StopNetwork(handle) => match state.network {
            Some(network) if network.packet_data_handle == *handle => {
                state.network = None;
                completed("Network stopped")
            }
            _ => Err(ProtocolError::response(QmiStatus::new(9, "InvalidHandle"))),
        },
        WdsRequest::GetPacketServiceStatus => {
            let limit = replies.disconnect_after_polls;
            let connection_status = match state.network.as_mut() {
                Some(network) => {
                    network.polls += 1;
                    match limit {
                        Some(limit) if network.polls > limit => ConnectionStatus::Disconnected,
                        _ => ConnectionStatus::Connected,
                    }
                }
                None => ConnectionStatus::Disconnected,
            };
            Ok(Response::PacketServiceStatus(PacketServiceStatus { connection_status }))
        }
        WdsRequest::GetPacketStatistics => {
            reply(&replies.packet_statistics, Response::PacketStatistics)
        }
        WdsRequest::GetDataBearerTechnology => {
            reply(&replies.data_bearer_technology, Response::DataBearerTechnology)
        }
        WdsRequest::GetCurrentDataBearerTechnology => reply(
            &replies.current_data_bearer_technology,
            Response::CurrentDataBearerTechnology,
        ),
        WdsRequest::GetProfileList(profile_type) => {
            Ok(Response::ProfileList(replies.profile_list(*profile_type)))
        }
        WdsRequest::GetDefaultSettings(profile_type) => replies
            .default_settings(*profile_type)
            .cloned()
            .map(Response::DefaultSettings)
            .ok_or_else(unavailable),
        WdsRequest::Reset => completed("Successfully performed WDS service reset"),
    }
}

fn uim(state: &mut EmulatedDevice, request: &UimRequest) -> ProtocolResult<Response> {
    let replies = &state.profile.uim;
    match request {
        UimRequest::ReadTransparent(path) => replies
            .file(path)
            .map(|file| Response::TransparentFile(file.transparent()))
            .ok_or_else(unavailable),
        UimRequest::GetFileAttributes(path) => replies
            .file(path)
            .and_then(|file| file.attributes.clone())
            .map(Response::FileAttributes)
            .ok_or_else(unavailable),
        UimRequest::Reset => completed("Successfully performed UIM service reset"),
    }
}

#[async_trait]
impl QmiBackend for EmulatorBackend {
    fn name(&self) -> &'static str {
        "emulator"
    }

    fn handles(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "toml")
    }

    async fn open(
        &self,
        path: &Path,
        flags: &OpenFlags,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ProtocolResult<DeviceHandle> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ProtocolError::Transport(format!("couldn't read device profile: {}", e))
        })?;
        let profile = DeviceProfile::from_toml(&content)
            .map_err(|e| ProtocolError::Transport(format!("invalid device profile: {}", e)))?;

        round_trip(profile.device.latency(), timeout, cancel).await?;
        if let Some(message) = &profile.device.open_error {
            return Err(ProtocolError::Transport(message.clone()));
        }

        let id = self.next_device_id.fetch_add(1, Ordering::SeqCst);
        debug!("emulated device {} opened with {:?}", id, flags);
        self.devices
            .lock()
            .await
            .insert(id, EmulatedDevice::new(profile));
        Ok(DeviceHandle::new(path, id))
    }

    async fn allocate_client(
        &self,
        device: &DeviceHandle,
        service: Service,
        cid: Option<Cid>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ProtocolResult<ClientHandle> {
        self.respond(device, timeout, cancel, |state| {
            if let Some(err) = state.profile.fault(ALLOCATE_FAULT) {
                return Err(err);
            }
            let listed = state.profile.services.is_empty()
                || state
                    .profile
                    .services
                    .iter()
                    .any(|version| version.service == service.id());
            if service == Service::Ctl || !listed {
                return Err(ProtocolError::UnsupportedService(service));
            }

            let cid = match cid {
                Some(cid) => cid,
                None => state
                    .next_cid(service)
                    .ok_or_else(|| ProtocolError::response(QmiStatus::client_ids_exhausted()))?,
            };
            state.clients.insert((service, cid.value()));
            info!("allocated {} client with cid {}", service, cid);
            Ok(ClientHandle::new(service, cid))
        })
        .await
    }

    async fn release_client(
        &self,
        device: &DeviceHandle,
        client: ClientHandle,
        timeout: Duration,
    ) -> ProtocolResult<()> {
        let never = CancellationToken::new();
        self.respond(device, timeout, &never, |state| {
            if let Some(err) = state.profile.fault(RELEASE_FAULT) {
                return Err(err);
            }
            if !state.clients.remove(&(client.service(), client.cid().value())) {
                return Err(ProtocolError::response(QmiStatus::invalid_client_id()));
            }
            Ok(())
        })
        .await
    }

    async fn device_request(
        &self,
        device: &DeviceHandle,
        request: &DeviceRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ProtocolResult<Response> {
        self.respond(device, timeout, cancel, |state| {
            if let Some(err) = state.profile.fault(request.flag_name()) {
                return Err(err);
            }
            match request {
                DeviceRequest::GetServiceVersionInfo => {
                    if state.profile.services.is_empty() {
                        return Err(unavailable());
                    }
                    Ok(Response::ServiceVersionInfo(ServiceVersionInfo {
                        services: state.profile.services.clone(),
                    }))
                }
                DeviceRequest::SetInstanceId(instance_id) => {
                    Ok(Response::InstanceIdSet(InstanceIdSet {
                        link_id: state
                            .profile
                            .device
                            .instance_link_base
                            .wrapping_add(u16::from(*instance_id)),
                    }))
                }
            }
        })
        .await
    }

    async fn client_request(
        &self,
        device: &DeviceHandle,
        client: &ClientHandle,
        request: &ServiceRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ProtocolResult<Response> {
        self.respond(device, timeout, cancel, |state| {
            if !state
                .clients
                .contains(&(client.service(), client.cid().value()))
            {
                return Err(ProtocolError::response(QmiStatus::invalid_client_id()));
            }
            if let Some(err) = state.profile.fault(request.flag_name()) {
                return Err(err);
            }
            match request {
                ServiceRequest::Dms(request) => dms(state, request),
                ServiceRequest::Nas(request) => nas(state, request),
                ServiceRequest::Wds(request) => wds(state, request),
                ServiceRequest::Pbm(PbmRequest::GetAllCapabilities) => reply(
                    &state.profile.pbm.capabilities,
                    Response::PhonebookCapabilities,
                ),
                ServiceRequest::Uim(request) => uim(state, request),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn profile_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    async fn open(backend: &EmulatorBackend, file: &NamedTempFile) -> DeviceHandle {
        backend
            .open(
                file.path(),
                &OpenFlags::default(),
                Duration::from_secs(1),
                &CancellationToken::new(),
            )
            .await
            .unwrap()
    }

    #[test]
    fn test_handles_toml_paths_only() {
        let backend = EmulatorBackend::new();
        assert!(backend.handles(Path::new("/tmp/modem.toml")));
        assert!(!backend.handles(Path::new("/dev/cdc-wdm0")));
    }

    #[tokio::test]
    async fn test_allocate_and_release() {
        let file = profile_file("");
        let backend = EmulatorBackend::new();
        let device = open(&backend, &file).await;
        let token = CancellationToken::new();
        let timeout = Duration::from_secs(1);

        let first = backend
            .allocate_client(&device, Service::Nas, None, timeout, &token)
            .await
            .unwrap();
        let second = backend
            .allocate_client(&device, Service::Nas, None, timeout, &token)
            .await
            .unwrap();
        assert_eq!(first.cid().value(), 1);
        assert_eq!(second.cid().value(), 2);
        assert_eq!(backend.allocated_cids(&device, Service::Nas).await, vec![1, 2]);

        backend.release_client(&device, first, timeout).await.unwrap();
        assert_eq!(backend.allocated_cids(&device, Service::Nas).await, vec![2]);
    }

    #[tokio::test]
    async fn test_unknown_client_is_invalid_client_id() {
        let file = profile_file("");
        let backend = EmulatorBackend::new();
        let device = open(&backend, &file).await;
        let token = CancellationToken::new();
        let timeout = Duration::from_secs(1);

        let client = backend
            .allocate_client(&device, Service::Nas, None, timeout, &token)
            .await
            .unwrap();
        let cid = client.cid();
        backend.release_client(&device, client, timeout).await.unwrap();

        let stale = ClientHandle::new(Service::Nas, cid);
        let err = backend
            .client_request(
                &device,
                &stale,
                &ServiceRequest::Dms(DmsRequest::GetIds),
                timeout,
                &token,
            )
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::response(QmiStatus::invalid_client_id()));

        let err = backend.release_client(&device, stale, timeout).await.unwrap_err();
        match err {
            ProtocolError::Response { status, .. } => {
                assert_eq!(status.code, 7);
                assert_eq!(status.name, "InvalidClientId");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ctl_has_no_clients() {
        let file = profile_file("");
        let backend = EmulatorBackend::new();
        let device = open(&backend, &file).await;
        let err = backend
            .allocate_client(
                &device,
                Service::Ctl,
                None,
                Duration::from_secs(1),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::UnsupportedService(Service::Ctl));
    }

    #[tokio::test]
    async fn test_missing_reply_is_info_unavailable() {
        let file = profile_file("");
        let backend = EmulatorBackend::new();
        let device = open(&backend, &file).await;
        let token = CancellationToken::new();
        let timeout = Duration::from_secs(1);
        let client = backend
            .allocate_client(&device, Service::Dms, None, timeout, &token)
            .await
            .unwrap();

        let err = backend
            .client_request(
                &device,
                &client,
                &ServiceRequest::Dms(DmsRequest::GetIds),
                timeout,
                &token,
            )
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::response(QmiStatus::info_unavailable()));
    }

    #[tokio::test]
    async fn test_slow_device_times_out() {
        let file = profile_file("[device]\nlatency_ms = 200\n");
        let backend = EmulatorBackend::new();
        let err = backend
            .open(
                file.path(),
                &OpenFlags::default(),
                Duration::from_millis(10),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::Timeout(Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn test_cancelled_request() {
        let file = profile_file("[device]\nlatency_ms = 50\n");
        let backend = EmulatorBackend::new();
        let device = open(&backend, &file).await;
        let token = CancellationToken::new();
        token.cancel();

        let err = backend
            .device_request(
                &device,
                &DeviceRequest::SetInstanceId(1),
                Duration::from_secs(1),
                &token,
            )
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::Cancelled);
    }

    #[tokio::test]
    async fn test_network_drops_after_polls() {
        let file = profile_file("[wds]\npacket_data_handle = 77\ndisconnect_after_polls = 1\n");
        let backend = EmulatorBackend::new();
        let device = open(&backend, &file).await;
        let token = CancellationToken::new();
        let timeout = Duration::from_secs(1);
        let client = backend
            .allocate_client(&device, Service::Wds, None, timeout, &token)
            .await
            .unwrap();

        let request = ServiceRequest::Wds(WdsRequest::StartNetwork(Default::default()));
        let started = backend
            .client_request(&device, &client, &request, timeout, &token)
            .await
            .unwrap();
        assert_eq!(
            started,
            Response::NetworkStarted(NetworkStarted {
                packet_data_handle: 77
            })
        );

        let status = ServiceRequest::Wds(WdsRequest::GetPacketServiceStatus);
        let mut seen = Vec::new();
        for _ in 0..2 {
            match backend
                .client_request(&device, &client, &status, timeout, &token)
                .await
                .unwrap()
            {
                Response::PacketServiceStatus(status) => seen.push(status.connection_status),
                other => panic!("unexpected reply {:?}", other),
            }
        }
        assert_eq!(
            seen,
            vec![ConnectionStatus::Connected, ConnectionStatus::Disconnected]
        );

        let stop = ServiceRequest::Wds(WdsRequest::StopNetwork(77));
        assert!(backend
            .client_request(&device, &client, &stop, timeout, &token)
            .await
            .is_ok());
    }
}
