//! Typed replies returned by the protocol backend.
//!
//! The same types are read from emulator device profiles, so every reply
//! derives both `Serialize` and `Deserialize`. Optional fields that the
//! device did not report stay `None` and are dropped from the output.

use super::types::Service;
use crate::domain::values::{
    AuthPreference, OperatingMode, ProfileType, RadioInterface, RatModePreference,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Raw bytes rendered as `aa:bb:cc`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl fmt::Display for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|b| hex::encode([*b])).collect();
        f.write_str(&parts.join(":"))
    }
}

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let digits: String = text
            .chars()
            .filter(|c| !matches!(c, ':' | ' ' | '-'))
            .collect();
        hex::decode(digits)
            .map(HexBytes)
            .map_err(serde::de::Error::custom)
    }
}

fn serialize_service_id<S: Serializer>(id: &u8, serializer: S) -> Result<S::Ok, S::Error> {
    match Service::from_id(*id) {
        Some(service) => serializer.serialize_str(service.as_str()),
        None => serializer.serialize_str(&format!("unknown 0x{:02x}", id)),
    }
}

// ---------------------------------------------------------------------------
// Device (CTL)

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceVersion {
    #[serde(serialize_with = "serialize_service_id")]
    pub service: u8,
    pub major: u16,
    pub minor: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceVersionInfo {
    pub services: Vec<ServiceVersion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceIdSet {
    pub link_id: u16,
}

// ---------------------------------------------------------------------------
// DMS

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceIds {
    pub esn: Option<String>,
    pub imei: Option<String>,
    pub meid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub max_tx_channel_rate: u32,
    pub max_rx_channel_rate: u32,
    pub data_service_capability: String,
    pub sim_capability: String,
    #[serde(default)]
    pub radio_interfaces: Vec<RadioInterface>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingModeState {
    pub mode: OperatingMode,
    pub hardware_restricted: Option<bool>,
    pub offline_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// NAS

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReading {
    pub radio_interface: RadioInterface,
    pub value: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcioReading {
    pub radio_interface: RadioInterface,
    pub ecio_dbm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalStrength {
    pub radio_interface: RadioInterface,
    pub strength_dbm: i8,
    #[serde(default)]
    pub other_interfaces: Vec<SignalReading>,
    #[serde(default)]
    pub rssi: Vec<SignalReading>,
    #[serde(default)]
    pub ecio: Vec<EcioReading>,
    pub io_dbm: Option<i32>,
    pub sinr_level: Option<u8>,
    pub rsrq: Option<SignalReading>,
    pub lte_snr_db: Option<f64>,
    pub lte_rsrp_dbm: Option<i16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdmaSignal {
    pub rssi_dbm: i8,
    pub ecio_dbm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HdrSignal {
    pub rssi_dbm: i8,
    pub ecio_dbm: f64,
    pub sinr_level: u8,
    pub io_dbm: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GsmSignal {
    pub rssi_dbm: i8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LteSignal {
    pub rssi_dbm: i8,
    pub rsrq_db: i8,
    pub rsrp_dbm: i16,
    pub snr_db: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalInfo {
    pub cdma: Option<CdmaSignal>,
    pub hdr: Option<HdrSignal>,
    pub gsm: Option<GsmSignal>,
    pub wcdma: Option<CdmaSignal>,
    pub lte: Option<LteSignal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RxChain {
    pub radio_tuned: bool,
    pub power_dbm: f64,
    pub ecio_db: Option<f64>,
    pub rscp_dbm: Option<f64>,
    pub rsrp_dbm: Option<f64>,
    pub phase_degrees: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxChain {
    pub in_traffic: bool,
    pub power_dbm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxRxInfo {
    pub radio_interface: RadioInterface,
    pub rx_chain_0: Option<RxChain>,
    pub rx_chain_1: Option<RxChain>,
    pub tx: Option<TxChain>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plmn {
    pub mcc: u16,
    pub mnc: u16,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeNetwork {
    pub mcc: u16,
    pub mnc: u16,
    pub description: String,
    pub sid: Option<u16>,
    pub nid: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServingSystem {
    pub registration_state: String,
    pub cs_attach_state: String,
    pub ps_attach_state: String,
    pub selected_network: String,
    #[serde(default)]
    pub radio_interfaces: Vec<RadioInterface>,
    pub roaming_indicator: Option<String>,
    #[serde(default)]
    pub data_service_capabilities: Vec<String>,
    pub current_plmn: Option<Plmn>,
    pub lac_3gpp: Option<u16>,
    pub cid_3gpp: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemService {
    pub radio_interface: RadioInterface,
    pub service_status: String,
    pub preferred_data_path: Option<bool>,
    pub domain: Option<String>,
    pub roaming: Option<bool>,
    pub forbidden: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub services: Vec<SystemService>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyPreference {
    pub active: Vec<String>,
    pub duration: String,
    pub persistent: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSelectionPreference {
    pub emergency_mode: Option<bool>,
    pub mode_preference: Option<RatModePreference>,
    pub band_preference: Option<u64>,
    pub lte_band_preference: Option<u64>,
    pub roaming_preference: Option<String>,
    pub network_selection_preference: Option<String>,
    pub service_domain_preference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedNetwork {
    pub mcc: u16,
    pub mnc: u16,
    pub description: String,
    #[serde(default)]
    pub status: Vec<String>,
    pub radio_interface: Option<RadioInterface>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkScan {
    pub networks: Vec<ScannedNetwork>,
}

// ---------------------------------------------------------------------------
// WDS

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStarted {
    pub packet_data_handle: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
    Suspended,
    Authenticating,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Suspended => "suspended",
            ConnectionStatus::Authenticating => "authenticating",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketServiceStatus {
    pub connection_status: ConnectionStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PacketStatistics {
    pub tx_packets_ok: Option<u32>,
    pub rx_packets_ok: Option<u32>,
    pub tx_packets_error: Option<u32>,
    pub rx_packets_error: Option<u32>,
    pub tx_overflows: Option<u32>,
    pub rx_overflows: Option<u32>,
    pub tx_bytes_ok: Option<u64>,
    pub rx_bytes_ok: Option<u64>,
    pub tx_packets_dropped: Option<u32>,
    pub rx_packets_dropped: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBearerTechnology {
    pub current: String,
    pub last: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentDataBearerTechnology {
    pub network_type: String,
    pub radio_access_technology: Option<String>,
    pub service_option: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub index: u8,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileList {
    pub profile_type: ProfileType,
    pub profiles: Vec<ProfileSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultSettings {
    pub profile_type: ProfileType,
    pub name: Option<String>,
    pub pdp_type: Option<String>,
    pub apn: Option<String>,
    pub username: Option<String>,
    pub auth: Option<AuthPreference>,
}

// ---------------------------------------------------------------------------
// PBM

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonebookCapability {
    pub phonebook_type: String,
    pub used_records: u16,
    pub maximum_records: u16,
    pub maximum_number_length: u8,
    pub maximum_name_length: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPhonebooks {
    pub session_type: String,
    pub phonebooks: Vec<PhonebookCapability>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupCapability {
    pub session_type: String,
    pub maximum_groups: u8,
    pub maximum_group_tag_length: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalNumberCapability {
    pub session_type: String,
    pub maximum_additional_numbers: u8,
    pub maximum_additional_number_length: u8,
    pub maximum_additional_number_tag_length: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailCapability {
    pub session_type: String,
    pub maximum_emails: u8,
    pub maximum_email_address_length: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondNameCapability {
    pub session_type: String,
    pub maximum_second_name_length: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiddenRecordsCapability {
    pub session_type: String,
    pub supported: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhonebookCapabilities {
    pub basic_information: Vec<SessionPhonebooks>,
    pub group: Vec<GroupCapability>,
    pub additional_number: Vec<AdditionalNumberCapability>,
    pub email: Vec<EmailCapability>,
    pub second_name: Vec<SecondNameCapability>,
    pub hidden_records: Vec<HiddenRecordsCapability>,
}

// ---------------------------------------------------------------------------
// UIM

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardResult {
    pub sw1: u8,
    pub sw2: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransparentFile {
    pub card_result: Option<CardResult>,
    pub data: HexBytes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAttributes {
    pub card_result: Option<CardResult>,
    pub file_size: u16,
    pub file_id: u16,
    pub file_type: String,
    pub record_size: u16,
    pub record_count: u16,
    pub raw: Option<HexBytes>,
}

// ---------------------------------------------------------------------------

/// Reply to requests whose only outcome is "done".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completed {
    pub message: String,
}

impl Completed {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Reply to a single dispatched action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    ServiceVersionInfo(ServiceVersionInfo),
    InstanceIdSet(InstanceIdSet),
    DeviceIds(DeviceIds),
    DeviceCapabilities(DeviceCapabilities),
    OperatingMode(OperatingModeState),
    SignalStrength(SignalStrength),
    SignalInfo(SignalInfo),
    TxRxInfo(TxRxInfo),
    HomeNetwork(HomeNetwork),
    ServingSystem(ServingSystem),
    SystemInfo(SystemInfo),
    TechnologyPreference(TechnologyPreference),
    SystemSelectionPreference(SystemSelectionPreference),
    NetworkScan(NetworkScan),
    NetworkStarted(NetworkStarted),
    PacketServiceStatus(PacketServiceStatus),
    PacketStatistics(PacketStatistics),
    DataBearerTechnology(DataBearerTechnology),
    CurrentDataBearerTechnology(CurrentDataBearerTechnology),
    ProfileList(ProfileList),
    DefaultSettings(DefaultSettings),
    PhonebookCapabilities(PhonebookCapabilities),
    TransparentFile(TransparentFile),
    FileAttributes(FileAttributes),
    Completed(Completed),
}

impl Response {
    /// Short title used by the text renderer.
    pub fn headline(&self) -> String {
        let title = match self {
            Response::ServiceVersionInfo(_) => "Supported versions",
            Response::InstanceIdSet(_) => "Instance ID set",
            Response::DeviceIds(_) => "Device IDs retrieved",
            Response::DeviceCapabilities(_) => "Device capabilities retrieved",
            Response::OperatingMode(_) => "Operating mode retrieved",
            Response::SignalStrength(_) => "Successfully got signal strength",
            Response::SignalInfo(_) => "Successfully got signal info",
            Response::TxRxInfo(_) => "TX/RX info",
            Response::HomeNetwork(_) => "Successfully got home network",
            Response::ServingSystem(_) => "Successfully got serving system",
            Response::SystemInfo(_) => "Successfully got system info",
            Response::TechnologyPreference(_) => "Successfully got technology preference",
            Response::SystemSelectionPreference(_) => {
                "Successfully got system selection preference"
            }
            Response::NetworkScan(_) => "Successfully scanned networks",
            Response::NetworkStarted(_) => "Network started",
            Response::PacketServiceStatus(_) => "Connection status",
            Response::PacketStatistics(_) => "Packet statistics",
            Response::DataBearerTechnology(_) => "Data bearer technology",
            Response::CurrentDataBearerTechnology(_) => "Current data bearer technology",
            Response::ProfileList(_) => "Profile list",
            Response::DefaultSettings(_) => "Default settings",
            Response::PhonebookCapabilities(_) => "Phonebook capabilities",
            Response::TransparentFile(_) => "Successfully read information from the UIM",
            Response::FileAttributes(_) => "Successfully got file attributes from the UIM",
            Response::Completed(done) => return done.message.clone(),
        };
        title.to_string()
    }
}
