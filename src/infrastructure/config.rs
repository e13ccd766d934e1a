use crate::core::protocol::OpenFlags;
use crate::domain::{
    config::{OpenConfig, QmiCtlConfig},
    error::{QmiCtlError, QmiCtlResult},
    values::parse_net_open_flags,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration manager
pub struct ConfigManager {
    global_config_path: Option<PathBuf>,
    project_config_path: Option<PathBuf>,
    explicit_config_path: Option<PathBuf>,
}

/// Device path after alias lookup, with the alias' default open flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDevice {
    pub path: PathBuf,
    pub open_flags: OpenFlags,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> Self {
        Self {
            global_config_path: Self::get_global_config_path(),
            project_config_path: Self::find_project_config_path(),
            explicit_config_path: None,
        }
    }

    /// Use only `path`, ignoring the global and project files.
    pub fn with_explicit_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: None,
            project_config_path: None,
            explicit_config_path: Some(path.into()),
        }
    }

    /// Load configuration from files
    pub fn load_config(&self) -> QmiCtlResult<QmiCtlConfig> {
        if let Some(path) = &self.explicit_config_path {
            return self.load_config_from_path(path);
        }

        let mut config = QmiCtlConfig::default();

        if let Some(global_path) = &self.global_config_path {
            if global_path.exists() {
                config = self.load_config_from_path(global_path)?;
            }
        }

        // Project files only contribute device aliases
        if let Some(project_path) = &self.project_config_path {
            if project_path.exists() {
                let project_config = self.load_config_from_path(project_path)?;
                config.devices.extend(project_config.devices);
            }
        }

        Ok(config)
    }

    /// Get global configuration path
    fn get_global_config_path() -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        Some(home.join(".config").join("qmictl").join("config.toml"))
    }

    /// Find project configuration path by walking up directory tree
    fn find_project_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut path = current_dir.as_path();

        loop {
            let config_path = path.join(".qmictl").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            path = path.parent()?;
        }
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> QmiCtlResult<QmiCtlConfig> {
        debug!("loading configuration from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| {
            QmiCtlError::configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&content).map_err(|e| {
            QmiCtlError::configuration(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve `name` against the configured aliases; anything else is a path.
pub fn resolve_device(config: &QmiCtlConfig, name: &str) -> QmiCtlResult<ResolvedDevice> {
    match config.device(name) {
        Some(device) => {
            debug!("device alias '{}' -> {}", name, device.path);
            Ok(ResolvedDevice {
                path: PathBuf::from(&device.path),
                open_flags: open_flags(&device.open)?,
            })
        }
        None => Ok(ResolvedDevice {
            path: PathBuf::from(name),
            open_flags: OpenFlags::default(),
        }),
    }
}

fn open_flags(open: &OpenConfig) -> QmiCtlResult<OpenFlags> {
    let net = match &open.net {
        Some(value) => Some(parse_net_open_flags(value).map_err(QmiCtlError::configuration)?),
        None => None,
    };

    Ok(OpenFlags {
        version_info: open.version_info,
        sync: open.sync,
        proxy: open.proxy,
        net,
    })
}
