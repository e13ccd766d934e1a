use serde::{Deserialize, Serialize};
use std::time::Duration;

/// qmictl configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QmiCtlConfig {
    /// Global configuration
    #[serde(default)]
    pub global: GlobalConfig,
    /// Named device aliases
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Log level used when neither RUST_LOG nor a verbosity flag is given
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_open_timeout")]
    pub open_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Applies to both client allocation and release
    #[serde(default = "default_release_timeout")]
    pub release_timeout_secs: u64,
    /// Packet service status polling period for --wds-follow-network
    #[serde(default = "default_follow_interval")]
    pub follow_interval_secs: u64,
    /// Device path or alias used when --device is not given
    #[serde(default)]
    pub default_device: Option<String>,
}

/// Named device alias
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub description: String,
    /// Open flags applied whenever this alias is used
    #[serde(default)]
    pub open: OpenConfig,
}

/// Default device open flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenConfig {
    #[serde(default)]
    pub proxy: bool,
    #[serde(default)]
    pub sync: bool,
    #[serde(default)]
    pub version_info: bool,
    /// Same syntax as --device-open-net
    #[serde(default)]
    pub net: Option<String>,
}

// Default value functions
fn default_log_level() -> String {
    "warn".to_string()
}

fn default_open_timeout() -> u64 {
    15
}

fn default_request_timeout() -> u64 {
    10
}

fn default_release_timeout() -> u64 {
    10
}

fn default_follow_interval() -> u64 {
    20
}

impl GlobalConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.open_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn release_timeout(&self) -> Duration {
        Duration::from_secs(self.release_timeout_secs)
    }

    pub fn follow_interval(&self) -> Duration {
        Duration::from_secs(self.follow_interval_secs)
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            open_timeout_secs: default_open_timeout(),
            request_timeout_secs: default_request_timeout(),
            release_timeout_secs: default_release_timeout(),
            follow_interval_secs: default_follow_interval(),
            default_device: None,
        }
    }
}

impl QmiCtlConfig {
    /// Look up a device alias by name.
    pub fn device(&self, name: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|device| device.name == name)
    }
}
