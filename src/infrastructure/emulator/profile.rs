//! TOML description of an emulated modem.
//!
//! ```toml
//! [device]
//! latency_ms = 20
//!
//! [[services]]
//! service = 3
//! major = 1
//! minor = 25
//!
//! [nas.home_network]
//! mcc = 214
//! mnc = 7
//! description = "Movistar"
//!
//! [faults."nas-network-scan"]
//! code = 94
//! name = "NotSupported"
//! ```
//!
//! Replies that are not described answer with `InfoUnavailable`.

use crate::core::protocol::response::{
    CurrentDataBearerTechnology, DataBearerTechnology, DefaultSettings, DeviceCapabilities,
    DeviceIds, FileAttributes, HexBytes, HomeNetwork, NetworkScan, OperatingModeState,
    PacketStatistics, PhonebookCapabilities, ProfileList, ServiceVersion, ServingSystem,
    SignalInfo, SignalStrength, SystemInfo, SystemSelectionPreference, TechnologyPreference,
    TransparentFile, TxRxInfo, CardResult,
};
use crate::core::protocol::{CallEndReason, ProtocolError, QmiStatus};
use crate::domain::values::{ProfileType, RadioInterface, UimFilePath};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Fault key consulted on client allocation.
pub const ALLOCATE_FAULT: &str = "client-allocate";
/// Fault key consulted on client release.
pub const RELEASE_FAULT: &str = "client-release";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    pub device: DeviceSection,
    /// Services reported by --get-service-version-info; when non-empty, only
    /// these services accept clients.
    pub services: Vec<ServiceVersion>,
    pub dms: DmsReplies,
    pub nas: NasReplies,
    pub wds: WdsReplies,
    pub pbm: PbmReplies,
    pub uim: UimReplies,
    /// Errors keyed by action flag name, e.g. `"wds-start-network"`.
    pub faults: HashMap<String, FaultSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeviceSection {
    /// Delay applied to every operation
    pub latency_ms: u64,
    /// Makes the device fail to open with this message
    pub open_error: Option<String>,
    /// Link id reported for instance id 0
    pub instance_link_base: u16,
}

impl DeviceSection {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DmsReplies {
    pub ids: Option<DeviceIds>,
    pub capabilities: Option<DeviceCapabilities>,
    pub operating_mode: Option<OperatingModeState>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NasReplies {
    pub signal_strength: Option<SignalStrength>,
    pub signal_info: Option<SignalInfo>,
    pub tx_rx_info: Vec<TxRxInfo>,
    pub home_network: Option<HomeNetwork>,
    pub serving_system: Option<ServingSystem>,
    pub system_info: Option<SystemInfo>,
    pub technology_preference: Option<TechnologyPreference>,
    pub system_selection_preference: Option<SystemSelectionPreference>,
    pub network_scan: Option<NetworkScan>,
}

impl NasReplies {
    pub fn tx_rx_info(&self, radio_interface: RadioInterface) -> Option<&TxRxInfo> {
        self.tx_rx_info
            .iter()
            .find(|info| info.radio_interface == radio_interface)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WdsReplies {
    /// Handle returned by start network
    pub packet_data_handle: Option<u32>,
    /// Status polls answered with "connected" before the network drops
    pub disconnect_after_polls: Option<u32>,
    pub packet_statistics: Option<PacketStatistics>,
    pub data_bearer_technology: Option<DataBearerTechnology>,
    pub current_data_bearer_technology: Option<CurrentDataBearerTechnology>,
    pub profile_lists: Vec<ProfileList>,
    pub default_settings: Vec<DefaultSettings>,
}

impl WdsReplies {
    pub fn profile_list(&self, profile_type: ProfileType) -> ProfileList {
        self.profile_lists
            .iter()
            .find(|list| list.profile_type == profile_type)
            .cloned()
            .unwrap_or(ProfileList {
                profile_type,
                profiles: Vec::new(),
            })
    }

    pub fn default_settings(&self, profile_type: ProfileType) -> Option<&DefaultSettings> {
        self.default_settings
            .iter()
            .find(|settings| settings.profile_type == profile_type)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PbmReplies {
    pub capabilities: Option<PhonebookCapabilities>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UimReplies {
    pub files: Vec<UimFile>,
}

impl UimReplies {
    pub fn file(&self, path: &UimFilePath) -> Option<&UimFile> {
        self.files
            .iter()
            .find(|file| file.path.parse::<UimFilePath>().ok().as_ref() == Some(path))
    }
}

/// Contents of one card file.
#[derive(Debug, Clone, Deserialize)]
pub struct UimFile {
    /// Same syntax as --uim-read-transparent
    pub path: String,
    #[serde(default)]
    pub data: HexBytes,
    #[serde(default)]
    pub card_result: Option<CardResult>,
    #[serde(default)]
    pub attributes: Option<FileAttributes>,
}

impl UimFile {
    pub fn transparent(&self) -> TransparentFile {
        TransparentFile {
            card_result: self.card_result,
            data: self.data.clone(),
        }
    }
}

/// Error injected in place of a reply.
#[derive(Debug, Clone, Deserialize)]
pub struct FaultSpec {
    #[serde(default = "default_fault_code")]
    pub code: u16,
    #[serde(default = "default_fault_name")]
    pub name: String,
    /// Fail at the transport level with this message instead
    #[serde(default)]
    pub transport: Option<String>,
    #[serde(default)]
    pub call_end_reason: Option<CallEndReason>,
}

fn default_fault_code() -> u16 {
    QmiStatus::internal().code
}

fn default_fault_name() -> String {
    QmiStatus::internal().name
}

impl FaultSpec {
    pub fn to_error(&self) -> ProtocolError {
        match &self.transport {
            Some(message) => ProtocolError::Transport(message.clone()),
            None => ProtocolError::Response {
                status: QmiStatus::new(self.code, self.name.clone()),
                call_end_reason: self.call_end_reason.clone(),
            },
        }
    }
}

impl DeviceProfile {
    pub fn from_toml(content: &str) -> Result<Self, String> {
        let profile: DeviceProfile = toml::from_str(content).map_err(|e| e.to_string())?;
        for file in &profile.uim.files {
            file.path.parse::<UimFilePath>()?;
        }
        Ok(profile)
    }

    pub fn fault(&self, key: &str) -> Option<ProtocolError> {
        self.faults.get(key).map(FaultSpec::to_error)
    }
}
