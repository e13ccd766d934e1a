use super::types::Service;
use crate::domain::values::{
    OperatingMode, ProfileType, RadioInterface, RatModePreference, StartNetworkInput, UimFilePath,
};
use std::time::Duration;

/// Bringing up a data session can take much longer than a query.
const START_NETWORK_TIMEOUT: Duration = Duration::from_secs(45);

/// Requests served by the device itself, without a service client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRequest {
    GetServiceVersionInfo,
    SetInstanceId(u8),
}

impl DeviceRequest {
    pub fn flag_name(&self) -> &'static str {
        match self {
            DeviceRequest::GetServiceVersionInfo => "get-service-version-info",
            DeviceRequest::SetInstanceId(_) => "device-set-instance-id",
        }
    }

    pub fn failure_context(&self) -> &'static str {
        match self {
            DeviceRequest::GetServiceVersionInfo => "couldn't get service version info",
            DeviceRequest::SetInstanceId(_) => "couldn't set instance id",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DmsRequest {
    GetIds,
    GetCapabilities,
    GetOperatingMode,
    SetOperatingMode(OperatingMode),
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NasRequest {
    GetSignalStrength,
    GetSignalInfo,
    GetTxRxInfo(RadioInterface),
    GetHomeNetwork,
    GetServingSystem,
    GetSystemInfo,
    GetTechnologyPreference,
    GetSystemSelectionPreference,
    SetSystemSelectionPreference(RatModePreference),
    NetworkScan,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WdsRequest {
    StartNetwork(StartNetworkInput),
    StopNetwork(u32),
    GetPacketServiceStatus,
    GetPacketStatistics,
    GetDataBearerTechnology,
    GetCurrentDataBearerTechnology,
    GetProfileList(ProfileType),
    GetDefaultSettings(ProfileType),
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PbmRequest {
    GetAllCapabilities,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UimRequest {
    ReadTransparent(UimFilePath),
    GetFileAttributes(UimFilePath),
    Reset,
}

/// A single request issued through an allocated service client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRequest {
    Dms(DmsRequest),
    Nas(NasRequest),
    Wds(WdsRequest),
    Pbm(PbmRequest),
    Uim(UimRequest),
}

impl ServiceRequest {
    pub fn service(&self) -> Service {
        match self {
            ServiceRequest::Dms(_) => Service::Dms,
            ServiceRequest::Nas(_) => Service::Nas,
            ServiceRequest::Wds(_) => Service::Wds,
            ServiceRequest::Pbm(_) => Service::Pbm,
            ServiceRequest::Uim(_) => Service::Uim,
        }
    }

    /// Command line flag that selects this request, without leading dashes.
    pub fn flag_name(&self) -> &'static str {
        match self {
            ServiceRequest::Dms(request) => match request {
                DmsRequest::GetIds => "dms-get-ids",
                DmsRequest::GetCapabilities => "dms-get-capabilities",
                DmsRequest::GetOperatingMode => "dms-get-operating-mode",
                DmsRequest::SetOperatingMode(_) => "dms-set-operating-mode",
                DmsRequest::Reset => "dms-reset",
            },
            ServiceRequest::Nas(request) => match request {
                NasRequest::GetSignalStrength => "nas-get-signal-strength",
                NasRequest::GetSignalInfo => "nas-get-signal-info",
                NasRequest::GetTxRxInfo(_) => "nas-get-tx-rx-info",
                NasRequest::GetHomeNetwork => "nas-get-home-network",
                NasRequest::GetServingSystem => "nas-get-serving-system",
                NasRequest::GetSystemInfo => "nas-get-system-info",
                NasRequest::GetTechnologyPreference => "nas-get-technology-preference",
                NasRequest::GetSystemSelectionPreference => "nas-get-system-selection-preference",
                NasRequest::SetSystemSelectionPreference(_) => {
                    "nas-set-system-selection-preference"
                }
                NasRequest::NetworkScan => "nas-network-scan",
                NasRequest::Reset => "nas-reset",
            },
            ServiceRequest::Wds(request) => match request {
                WdsRequest::StartNetwork(_) => "wds-start-network",
                WdsRequest::StopNetwork(_) => "wds-stop-network",
                WdsRequest::GetPacketServiceStatus => "wds-get-packet-service-status",
                WdsRequest::GetPacketStatistics => "wds-get-packet-statistics",
                WdsRequest::GetDataBearerTechnology => "wds-get-data-bearer-technology",
                WdsRequest::GetCurrentDataBearerTechnology => {
                    "wds-get-current-data-bearer-technology"
                }
                WdsRequest::GetProfileList(_) => "wds-get-profile-list",
                WdsRequest::GetDefaultSettings(_) => "wds-get-default-settings",
                WdsRequest::Reset => "wds-reset",
            },
            ServiceRequest::Pbm(PbmRequest::GetAllCapabilities) => "pbm-get-all-capabilities",
            ServiceRequest::Uim(request) => match request {
                UimRequest::ReadTransparent(_) => "uim-read-transparent",
                UimRequest::GetFileAttributes(_) => "uim-get-file-attributes",
                UimRequest::Reset => "uim-reset",
            },
        }
    }

    /// Headline used when the device answers with a protocol error.
    pub fn failure_context(&self) -> &'static str {
        match self {
            ServiceRequest::Dms(request) => match request {
                DmsRequest::GetIds => "couldn't get IDs",
                DmsRequest::GetCapabilities => "couldn't get capabilities",
                DmsRequest::GetOperatingMode => "couldn't get operating mode",
                DmsRequest::SetOperatingMode(_) => "couldn't set operating mode",
                DmsRequest::Reset => "couldn't reset the DMS service",
            },
            ServiceRequest::Nas(request) => match request {
                NasRequest::GetSignalStrength => "couldn't get signal strength",
                NasRequest::GetSignalInfo => "couldn't get signal info",
                NasRequest::GetTxRxInfo(_) => "couldn't get TX/RX info",
                NasRequest::GetHomeNetwork => "couldn't get home network",
                NasRequest::GetServingSystem => "couldn't get serving system",
                NasRequest::GetSystemInfo => "couldn't get system info",
                NasRequest::GetTechnologyPreference => "couldn't get technology preference",
                NasRequest::GetSystemSelectionPreference => {
                    "couldn't get system selection preference"
                }
                NasRequest::SetSystemSelectionPreference(_) => {
                    "couldn't set system selection preference"
                }
                NasRequest::NetworkScan => "couldn't scan networks",
                NasRequest::Reset => "couldn't reset the NAS service",
            },
            ServiceRequest::Wds(request) => match request {
                WdsRequest::StartNetwork(_) => "couldn't start network",
                WdsRequest::StopNetwork(_) => "couldn't stop network",
                WdsRequest::GetPacketServiceStatus => "couldn't get packet service status",
                WdsRequest::GetPacketStatistics => "couldn't get packet statistics",
                WdsRequest::GetDataBearerTechnology => "couldn't get data bearer technology",
                WdsRequest::GetCurrentDataBearerTechnology => {
                    "couldn't get current data bearer technology"
                }
                WdsRequest::GetProfileList(_) => "couldn't get profile list",
                WdsRequest::GetDefaultSettings(_) => "couldn't get default settings",
                WdsRequest::Reset => "couldn't reset the WDS service",
            },
            ServiceRequest::Pbm(PbmRequest::GetAllCapabilities) => "couldn't get capabilities",
            ServiceRequest::Uim(request) => match request {
                UimRequest::ReadTransparent(_) => "couldn't read transparent file from the UIM",
                UimRequest::GetFileAttributes(_) => "couldn't get file attributes from the UIM",
                UimRequest::Reset => "couldn't reset the UIM service",
            },
        }
    }

    /// Timeout for this request given the configured default.
    pub fn timeout(&self, default: Duration) -> Duration {
        match self {
            ServiceRequest::Wds(WdsRequest::StartNetwork(_)) => default.max(START_NETWORK_TIMEOUT),
            _ => default,
        }
    }
}
