use crate::core::action::Action;
use crate::core::protocol::{
    Cid, DeviceRequest, DmsRequest, NasRequest, OpenFlags, PbmRequest, ReleasePolicy, Service,
    ServiceRequest, UimRequest, WdsRequest,
};
use crate::domain::error::{QmiCtlError, QmiCtlResult};
use crate::domain::values::{
    parse_cid, parse_instance_id, parse_net_open_flags, parse_packet_data_handle,
};
use clap::{Args as ClapArgs, Parser, ValueEnum};
use std::path::PathBuf;

/// Command line arguments for qmictl
#[derive(Parser, Debug, Default)]
#[command(
    name = "qmictl",
    about = "Control QMI modems from the command line",
    long_about = "Runs a single QMI action against a modem: opens the device, allocates a client for the action's service, issues the request and releases the client. Results are printed as JSON or text.",
    disable_version_flag = true
)]
pub struct Args {
    /// Device path, or a device name from the configuration
    #[arg(short, long, value_name = "PATH|NAME")]
    pub device: Option<String>,

    /// Run version info check when opening device
    #[arg(long)]
    pub device_open_version_info: bool,

    /// Run sync operation when opening device
    #[arg(long)]
    pub device_open_sync: bool,

    /// Request to use the 'qmi-proxy' proxy
    #[arg(short = 'p', long)]
    pub device_open_proxy: bool,

    /// Open device with specific link protocol and QoS flags
    #[arg(long, value_name = "net-802-3|net-raw-ip|net-qos-header|net-no-qos-header")]
    pub device_open_net: Option<String>,

    /// Use the given CID, don't allocate a new one
    #[arg(long, value_name = "CID")]
    pub client_cid: Option<String>,

    /// Do not release the CID when exiting
    #[arg(long)]
    pub client_no_release_cid: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub output: OutputFormat,

    /// Print compact JSON
    #[arg(short, long)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable logging
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub silent: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print version
    #[arg(short = 'V', long)]
    pub version: bool,

    #[command(flatten)]
    pub ctl: CtlOptions,

    #[command(flatten)]
    pub dms: DmsOptions,

    #[command(flatten)]
    pub nas: NasOptions,

    #[command(flatten)]
    pub wds: WdsOptions,

    #[command(flatten)]
    pub pbm: PbmOptions,

    #[command(flatten)]
    pub uim: UimOptions,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Indented JSON
    #[default]
    Json,
    /// Single line JSON
    Compact,
    /// Human-readable text output
    Text,
}

/// Everything needed to dispatch one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Device path or configured device name
    pub device: String,
    pub action: Action,
    pub open_flags: OpenFlags,
    pub cid: Option<Cid>,
    pub release_policy: ReleasePolicy,
}

/// One service's block of mutually exclusive action options.
trait ActionGroup {
    fn name(&self) -> &'static str;

    /// Number of actions enabled in this group.
    fn enabled(&self) -> usize;

    /// Parse the enabled action's value; only called when exactly one is set.
    fn build(&self) -> Result<Action, String>;
}

fn count(flags: &[bool]) -> usize {
    flags.iter().filter(|flag| **flag).count()
}

fn parse<T: std::str::FromStr<Err = String>>(value: &str) -> Result<T, String> {
    value.parse()
}

#[derive(ClapArgs, Debug, Default)]
#[command(next_help_heading = "Device options")]
pub struct CtlOptions {
    /// Get service version info
    #[arg(long)]
    pub get_service_version_info: bool,

    /// Set instance ID
    #[arg(long, value_name = "INSTANCE_ID")]
    pub device_set_instance_id: Option<String>,
}

impl ActionGroup for CtlOptions {
    fn name(&self) -> &'static str {
        "CTL"
    }

    fn enabled(&self) -> usize {
        count(&[
            self.get_service_version_info,
            self.device_set_instance_id.is_some(),
        ])
    }

    fn build(&self) -> Result<Action, String> {
        let request = match &self.device_set_instance_id {
            Some(value) => DeviceRequest::SetInstanceId(parse_instance_id(value)?),
            None => DeviceRequest::GetServiceVersionInfo,
        };
        Ok(Action::Device(request))
    }
}

#[derive(ClapArgs, Debug, Default)]
#[command(next_help_heading = "DMS options")]
pub struct DmsOptions {
    /// Get IDs
    #[arg(long)]
    pub dms_get_ids: bool,

    /// Get capabilities
    #[arg(long)]
    pub dms_get_capabilities: bool,

    /// Get operating mode
    #[arg(long)]
    pub dms_get_operating_mode: bool,

    /// Set operating mode
    #[arg(long, value_name = "online|low-power|factory-test|offline|reset|persistent-low-power|mode-only-low-power")]
    pub dms_set_operating_mode: Option<String>,

    /// Reset the service state
    #[arg(long)]
    pub dms_reset: bool,

    /// Just allocate or release a DMS client. Use with `--client-no-release-cid' and/or `--client-cid'
    #[arg(long)]
    pub dms_noop: bool,
}

impl ActionGroup for DmsOptions {
    fn name(&self) -> &'static str {
        "DMS"
    }

    fn enabled(&self) -> usize {
        count(&[
            self.dms_get_ids,
            self.dms_get_capabilities,
            self.dms_get_operating_mode,
            self.dms_set_operating_mode.is_some(),
            self.dms_reset,
            self.dms_noop,
        ])
    }

    fn build(&self) -> Result<Action, String> {
        let request = if let Some(mode) = &self.dms_set_operating_mode {
            DmsRequest::SetOperatingMode(parse(mode)?)
        } else if self.dms_get_ids {
            DmsRequest::GetIds
        } else if self.dms_get_capabilities {
            DmsRequest::GetCapabilities
        } else if self.dms_get_operating_mode {
            DmsRequest::GetOperatingMode
        } else if self.dms_reset {
            DmsRequest::Reset
        } else {
            return Ok(Action::noop(Service::Dms));
        };
        Ok(Action::request(ServiceRequest::Dms(request)))
    }
}

#[derive(ClapArgs, Debug, Default)]
#[command(next_help_heading = "NAS options")]
pub struct NasOptions {
    /// Get signal strength
    #[arg(long)]
    pub nas_get_signal_strength: bool,

    /// Get signal info
    #[arg(long)]
    pub nas_get_signal_info: bool,

    /// Get TX/RX info
    #[arg(long, value_name = "lte|umts|gsm|cdma-1x|cdma-1xevdo|td-scdma")]
    pub nas_get_tx_rx_info: Option<String>,

    /// Get home network
    #[arg(long)]
    pub nas_get_home_network: bool,

    /// Get serving system
    #[arg(long)]
    pub nas_get_serving_system: bool,

    /// Get system info
    #[arg(long)]
    pub nas_get_system_info: bool,

    /// Get technology preference
    #[arg(long)]
    pub nas_get_technology_preference: bool,

    /// Get system selection preference
    #[arg(long)]
    pub nas_get_system_selection_preference: bool,

    /// Set system selection preference
    #[arg(long, value_name = "cdma-1x|cdma-1xevdo|gsm|umts|lte|td-scdma")]
    pub nas_set_system_selection_preference: Option<String>,

    /// Scan networks
    #[arg(long)]
    pub nas_network_scan: bool,

    /// Reset the service state
    #[arg(long)]
    pub nas_reset: bool,

    /// Just allocate or release a NAS client. Use with `--client-no-release-cid' and/or `--client-cid'
    #[arg(long)]
    pub nas_noop: bool,
}

impl ActionGroup for NasOptions {
    fn name(&self) -> &'static str {
        "NAS"
    }

    fn enabled(&self) -> usize {
        count(&[
            self.nas_get_signal_strength,
            self.nas_get_signal_info,
            self.nas_get_tx_rx_info.is_some(),
            self.nas_get_home_network,
            self.nas_get_serving_system,
            self.nas_get_system_info,
            self.nas_get_technology_preference,
            self.nas_get_system_selection_preference,
            self.nas_set_system_selection_preference.is_some(),
            self.nas_network_scan,
            self.nas_reset,
            self.nas_noop,
        ])
    }

    fn build(&self) -> Result<Action, String> {
        let request = if let Some(value) = &self.nas_get_tx_rx_info {
            NasRequest::GetTxRxInfo(parse(value)?)
        } else if let Some(value) = &self.nas_set_system_selection_preference {
            NasRequest::SetSystemSelectionPreference(parse(value)?)
        } else if self.nas_get_signal_strength {
            NasRequest::GetSignalStrength
        } else if self.nas_get_signal_info {
            NasRequest::GetSignalInfo
        } else if self.nas_get_home_network {
            NasRequest::GetHomeNetwork
        } else if self.nas_get_serving_system {
            NasRequest::GetServingSystem
        } else if self.nas_get_system_info {
            NasRequest::GetSystemInfo
        } else if self.nas_get_technology_preference {
            NasRequest::GetTechnologyPreference
        } else if self.nas_get_system_selection_preference {
            NasRequest::GetSystemSelectionPreference
        } else if self.nas_network_scan {
            NasRequest::NetworkScan
        } else if self.nas_reset {
            NasRequest::Reset
        } else {
            return Ok(Action::noop(Service::Nas));
        };
        Ok(Action::request(ServiceRequest::Nas(request)))
    }
}

#[derive(ClapArgs, Debug, Default)]
#[command(next_help_heading = "WDS options")]
pub struct WdsOptions {
    /// Start network (Authentication, Username and Password are optional)
    #[arg(
        long,
        value_name = "[\"APN[,(PAP|CHAP|BOTH),USERNAME,PASSWORD]\"]",
        num_args = 0..=1,
        default_missing_value = ""
    )]
    pub wds_start_network: Option<String>,

    /// Follow the network status until disconnected. Use with `--wds-start-network'
    #[arg(long)]
    pub wds_follow_network: bool,

    /// Stop network
    #[arg(long, value_name = "PACKET_DATA_HANDLE")]
    pub wds_stop_network: Option<String>,

    /// Get packet service status
    #[arg(long)]
    pub wds_get_packet_service_status: bool,

    /// Get packet statistics
    #[arg(long)]
    pub wds_get_packet_statistics: bool,

    /// Get data bearer technology
    #[arg(long)]
    pub wds_get_data_bearer_technology: bool,

    /// Get current data bearer technology
    #[arg(long)]
    pub wds_get_current_data_bearer_technology: bool,

    /// Get profile list
    #[arg(long, value_name = "3gpp|3gpp2")]
    pub wds_get_profile_list: Option<String>,

    /// Get default settings
    #[arg(long, value_name = "3gpp|3gpp2")]
    pub wds_get_default_settings: Option<String>,

    /// Reset the service state
    #[arg(long)]
    pub wds_reset: bool,

    /// Just allocate or release a WDS client. Use with `--client-no-release-cid' and/or `--client-cid'
    #[arg(long)]
    pub wds_noop: bool,
}

impl WdsOptions {
    /// The follow modifier is meaningless on its own.
    fn check_modifiers(&self) -> Result<(), String> {
        if self.wds_follow_network && self.wds_start_network.is_none() {
            return Err("--wds-follow-network must be used with --wds-start-network".to_string());
        }
        Ok(())
    }
}

impl ActionGroup for WdsOptions {
    fn name(&self) -> &'static str {
        "WDS"
    }

    fn enabled(&self) -> usize {
        count(&[
            self.wds_start_network.is_some(),
            self.wds_stop_network.is_some(),
            self.wds_get_packet_service_status,
            self.wds_get_packet_statistics,
            self.wds_get_data_bearer_technology,
            self.wds_get_current_data_bearer_technology,
            self.wds_get_profile_list.is_some(),
            self.wds_get_default_settings.is_some(),
            self.wds_reset,
            self.wds_noop,
        ])
    }

    fn build(&self) -> Result<Action, String> {
        let request = if let Some(value) = &self.wds_start_network {
            let input = parse(value)?;
            if self.wds_follow_network {
                return Ok(Action::follow_network(input));
            }
            WdsRequest::StartNetwork(input)
        } else if let Some(value) = &self.wds_stop_network {
            WdsRequest::StopNetwork(parse_packet_data_handle(value)?)
        } else if let Some(value) = &self.wds_get_profile_list {
            WdsRequest::GetProfileList(parse(value)?)
        } else if let Some(value) = &self.wds_get_default_settings {
            WdsRequest::GetDefaultSettings(parse(value)?)
        } else if self.wds_get_packet_service_status {
            WdsRequest::GetPacketServiceStatus
        } else if self.wds_get_packet_statistics {
            WdsRequest::GetPacketStatistics
        } else if self.wds_get_data_bearer_technology {
            WdsRequest::GetDataBearerTechnology
        } else if self.wds_get_current_data_bearer_technology {
            WdsRequest::GetCurrentDataBearerTechnology
        } else if self.wds_reset {
            WdsRequest::Reset
        } else {
            return Ok(Action::noop(Service::Wds));
        };
        Ok(Action::request(ServiceRequest::Wds(request)))
    }
}

#[derive(ClapArgs, Debug, Default)]
#[command(next_help_heading = "PBM options")]
pub struct PbmOptions {
    /// Get all phonebook capabilities
    #[arg(long)]
    pub pbm_get_all_capabilities: bool,

    /// Just allocate or release a PBM client. Use with `--client-no-release-cid' and/or `--client-cid'
    #[arg(long)]
    pub pbm_noop: bool,
}

impl ActionGroup for PbmOptions {
    fn name(&self) -> &'static str {
        "PBM"
    }

    fn enabled(&self) -> usize {
        count(&[self.pbm_get_all_capabilities, self.pbm_noop])
    }

    fn build(&self) -> Result<Action, String> {
        if self.pbm_get_all_capabilities {
            Ok(Action::request(ServiceRequest::Pbm(
                PbmRequest::GetAllCapabilities,
            )))
        } else {
            Ok(Action::noop(Service::Pbm))
        }
    }
}

#[derive(ClapArgs, Debug, Default)]
#[command(next_help_heading = "UIM options")]
pub struct UimOptions {
    /// Read a transparent file given the file path
    #[arg(long, value_name = "0xNNNN,0xNNNN,...")]
    pub uim_read_transparent: Option<String>,

    /// Get the attributes of a given file
    #[arg(long, value_name = "0xNNNN,0xNNNN,...")]
    pub uim_get_file_attributes: Option<String>,

    /// Reset the service state
    #[arg(long)]
    pub uim_reset: bool,

    /// Just allocate or release a UIM client. Use with `--client-no-release-cid' and/or `--client-cid'
    #[arg(long)]
    pub uim_noop: bool,
}

impl ActionGroup for UimOptions {
    fn name(&self) -> &'static str {
        "UIM"
    }

    fn enabled(&self) -> usize {
        count(&[
            self.uim_read_transparent.is_some(),
            self.uim_get_file_attributes.is_some(),
            self.uim_reset,
            self.uim_noop,
        ])
    }

    fn build(&self) -> Result<Action, String> {
        let request = if let Some(value) = &self.uim_read_transparent {
            UimRequest::ReadTransparent(parse(value)?)
        } else if let Some(value) = &self.uim_get_file_attributes {
            UimRequest::GetFileAttributes(parse(value)?)
        } else if self.uim_reset {
            UimRequest::Reset
        } else {
            return Ok(Action::noop(Service::Uim));
        };
        Ok(Action::request(ServiceRequest::Uim(request)))
    }
}

impl Args {
    /// `--json` wins over `--output`.
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Compact
        } else {
            self.output
        }
    }

    fn groups(&self) -> [&dyn ActionGroup; 6] {
        [
            &self.ctl, &self.dms, &self.nas, &self.wds, &self.pbm, &self.uim,
        ]
    }

    /// Validate the selection and parse the values of the chosen action.
    ///
    /// Every error is raised before any device interaction.
    pub fn invocation(&self, default_device: Option<&str>) -> QmiCtlResult<Invocation> {
        let device = self
            .device
            .as_deref()
            .or(default_device)
            .filter(|device| !device.is_empty())
            .ok_or_else(|| QmiCtlError::configuration("no device path given"))?
            .to_string();

        self.wds
            .check_modifiers()
            .map_err(QmiCtlError::configuration)?;

        let groups = self.groups();
        if let Some(group) = groups.iter().find(|group| group.enabled() > 1) {
            return Err(QmiCtlError::configuration(format!(
                "too many {} actions requested",
                group.name()
            )));
        }

        let mut selected = groups.iter().filter(|group| group.enabled() > 0);
        let group = match (selected.next(), selected.next()) {
            (Some(group), None) => group,
            (Some(_), Some(_)) => {
                return Err(QmiCtlError::configuration(
                    "cannot execute multiple actions of different services",
                ))
            }
            (None, _) => return Err(QmiCtlError::configuration("no actions specified")),
        };

        let action = group.build().map_err(QmiCtlError::configuration)?;

        let cid = self
            .client_cid
            .as_deref()
            .map(parse_cid)
            .transpose()
            .map_err(QmiCtlError::configuration)?;

        let net = self
            .device_open_net
            .as_deref()
            .map(parse_net_open_flags)
            .transpose()
            .map_err(QmiCtlError::configuration)?;

        Ok(Invocation {
            device,
            action,
            open_flags: OpenFlags {
                version_info: self.device_open_version_info,
                sync: self.device_open_sync,
                proxy: self.device_open_proxy,
                net,
            },
            cid,
            release_policy: if self.client_no_release_cid {
                ReleasePolicy::Retain
            } else {
                ReleasePolicy::Release
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::Operation;
    use crate::domain::values::{OperatingMode, RadioInterface};

    fn parse_args(extra: &[&str]) -> Args {
        let mut argv = vec!["qmictl"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    fn error(extra: &[&str]) -> String {
        parse_args(extra).invocation(None).unwrap_err().headline()
    }

    #[test]
    fn test_command_definition_is_valid() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_single_action() {
        let invocation = parse_args(&["-d", "/dev/cdc-wdm0", "--nas-get-home-network"])
            .invocation(None)
            .unwrap();
        assert_eq!(invocation.device, "/dev/cdc-wdm0");
        assert_eq!(
            invocation.action,
            Action::request(ServiceRequest::Nas(NasRequest::GetHomeNetwork))
        );
        assert_eq!(invocation.release_policy, ReleasePolicy::Release);
        assert!(invocation.cid.is_none());
    }

    #[test]
    fn test_default_device_from_config() {
        let invocation = parse_args(&["--dms-get-ids"])
            .invocation(Some("modem"))
            .unwrap();
        assert_eq!(invocation.device, "modem");
    }

    #[test]
    fn test_validation_order() {
        assert_eq!(error(&["--dms-get-ids"]), "no device path given");
        assert_eq!(
            error(&["-d", "x", "--nas-reset", "--nas-noop", "--dms-get-ids"]),
            "too many NAS actions requested"
        );
        assert_eq!(
            error(&["-d", "x", "--nas-reset", "--dms-get-ids"]),
            "cannot execute multiple actions of different services"
        );
        assert_eq!(error(&["-d", "x"]), "no actions specified");
        assert_eq!(
            error(&["-d", "x", "--client-cid", "0", "--dms-get-ids"]),
            "invalid cid given: '0'"
        );
    }

    #[test]
    fn test_string_options_count_as_enabled() {
        assert_eq!(
            error(&["-d", "x", "--dms-set-operating-mode", "bogus", "--dms-reset"]),
            "too many DMS actions requested"
        );
        assert_eq!(
            error(&["-d", "x", "--dms-set-operating-mode", "bogus"]),
            "invalid operating mode value given: 'bogus'"
        );
    }

    #[test]
    fn test_values_are_parsed() {
        let invocation = parse_args(&["-d", "x", "--dms-set-operating-mode", "low-power"])
            .invocation(None)
            .unwrap();
        assert_eq!(
            invocation.action,
            Action::request(ServiceRequest::Dms(DmsRequest::SetOperatingMode(
                OperatingMode::LowPower
            )))
        );

        let invocation = parse_args(&["-d", "x", "--nas-get-tx-rx-info", "lte"])
            .invocation(None)
            .unwrap();
        assert_eq!(
            invocation.action,
            Action::request(ServiceRequest::Nas(NasRequest::GetTxRxInfo(
                RadioInterface::Lte
            )))
        );
    }

    #[test]
    fn test_follow_network() {
        let invocation = parse_args(&[
            "-d",
            "x",
            "--wds-start-network",
            "internet",
            "--wds-follow-network",
        ])
        .invocation(None)
        .unwrap();
        match invocation.action {
            Action::Service {
                operation: Operation::FollowNetwork(input),
                ..
            } => assert_eq!(input.apn.as_deref(), Some("internet")),
            other => panic!("unexpected action {:?}", other),
        }

        assert_eq!(
            error(&["-d", "x", "--wds-follow-network"]),
            "--wds-follow-network must be used with --wds-start-network"
        );
    }

    #[test]
    fn test_start_network_without_value() {
        let invocation = parse_args(&["-d", "x", "--wds-start-network"])
            .invocation(None)
            .unwrap();
        assert_eq!(
            invocation.action,
            Action::request(ServiceRequest::Wds(WdsRequest::StartNetwork(
                Default::default()
            )))
        );
    }

    #[test]
    fn test_client_options() {
        let invocation = parse_args(&[
            "-d",
            "x",
            "--pbm-noop",
            "--client-cid",
            "7",
            "--client-no-release-cid",
            "--device-open-net",
            "net-raw-ip|net-no-qos-header",
            "-p",
        ])
        .invocation(None)
        .unwrap();
        assert_eq!(invocation.action, Action::noop(Service::Pbm));
        assert_eq!(invocation.cid.map(|cid| cid.value()), Some(7));
        assert_eq!(invocation.release_policy, ReleasePolicy::Retain);
        assert!(invocation.open_flags.proxy);
        assert!(invocation.open_flags.net.is_some());
    }

    #[test]
    fn test_output_format() {
        assert_eq!(parse_args(&[]).output_format(), OutputFormat::Json);
        assert_eq!(parse_args(&["-j"]).output_format(), OutputFormat::Compact);
        assert_eq!(
            parse_args(&["-o", "text"]).output_format(),
            OutputFormat::Text
        );
    }

    #[test]
    fn test_device_action() {
        let invocation = parse_args(&["-d", "x", "--device-set-instance-id", "3"])
            .invocation(None)
            .unwrap();
        assert_eq!(
            invocation.action,
            Action::Device(DeviceRequest::SetInstanceId(3))
        );
    }
}
