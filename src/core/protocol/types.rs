use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// QMI services this client knows how to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// Control service, used for device-level requests
    Ctl,
    /// Device Management Service
    Dms,
    /// Network Access Service
    Nas,
    /// Wireless Data Service
    Wds,
    /// Phonebook Manager
    Pbm,
    /// User Identity Module
    Uim,
}

impl Service {
    pub const ALL: [Service; 6] = [
        Service::Ctl,
        Service::Dms,
        Service::Nas,
        Service::Wds,
        Service::Pbm,
        Service::Uim,
    ];

    /// Numeric service identifier as used on the wire.
    pub fn id(&self) -> u8 {
        match self {
            Service::Ctl => 0x00,
            Service::Wds => 0x01,
            Service::Dms => 0x02,
            Service::Nas => 0x03,
            Service::Uim => 0x0B,
            Service::Pbm => 0x0C,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|service| service.id() == id)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Ctl => "ctl",
            Service::Dms => "dms",
            Service::Nas => "nas",
            Service::Wds => "wds",
            Service::Pbm => "pbm",
            Service::Uim => "uim",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client identifier allocated from the device for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cid(u8);

impl Cid {
    /// CID 0 is reserved for "none" and never names a client.
    pub fn new(value: u8) -> Option<Self> {
        (value != 0).then_some(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Link layer protocol requested on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkProtocol {
    Ieee8023,
    RawIp,
}

/// Data format flags applied when the device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetOpenFlags {
    pub link_protocol: LinkProtocol,
    pub qos_header: bool,
}

/// Flags controlling how the device is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFlags {
    pub version_info: bool,
    pub sync: bool,
    pub proxy: bool,
    pub net: Option<NetOpenFlags>,
}

impl OpenFlags {
    /// Flags set in either side win; `net` from `other` replaces ours when present.
    pub fn merged_with(self, other: OpenFlags) -> OpenFlags {
        OpenFlags {
            version_info: self.version_info || other.version_info,
            sync: self.sync || other.sync,
            proxy: self.proxy || other.proxy,
            net: other.net.or(self.net),
        }
    }
}

/// Open connection to a QMI device, owned by the session.
#[derive(Debug, PartialEq, Eq)]
pub struct DeviceHandle {
    path: PathBuf,
    id: u64,
}

impl DeviceHandle {
    pub fn new(path: impl Into<PathBuf>, id: u64) -> Self {
        Self {
            path: path.into(),
            id,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Backend specific identifier of the open connection.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn display(&self) -> String {
        self.path.display().to_string()
    }
}

/// Client allocated for one service on an open device.
///
/// Not `Clone`: releasing consumes the handle.
#[derive(Debug, PartialEq, Eq)]
pub struct ClientHandle {
    service: Service,
    cid: Cid,
}

impl ClientHandle {
    pub fn new(service: Service, cid: Cid) -> Self {
        Self { service, cid }
    }

    pub fn service(&self) -> Service {
        self.service
    }

    pub fn cid(&self) -> Cid {
        self.cid
    }
}

/// What happens to the client when the session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReleasePolicy {
    #[default]
    Release,
    Retain,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_ids_round_trip() {
        for service in Service::ALL {
            assert_eq!(Service::from_id(service.id()), Some(service));
        }
        assert_eq!(Service::from_id(0x1f), None);
    }

    #[test]
    fn test_cid_zero_is_rejected() {
        assert!(Cid::new(0).is_none());
        assert_eq!(Cid::new(7).map(|cid| cid.value()), Some(7));
    }

    #[test]
    fn test_open_flags_merge() {
        let configured = OpenFlags {
            proxy: true,
            net: Some(NetOpenFlags {
                link_protocol: LinkProtocol::Ieee8023,
                qos_header: true,
            }),
            ..OpenFlags::default()
        };
        let cli = OpenFlags {
            sync: true,
            net: Some(NetOpenFlags {
                link_protocol: LinkProtocol::RawIp,
                qos_header: false,
            }),
            ..OpenFlags::default()
        };

        let merged = configured.merged_with(cli);
        assert!(merged.proxy);
        assert!(merged.sync);
        assert!(!merged.version_info);
        assert_eq!(merged.net.map(|n| n.link_protocol), Some(LinkProtocol::RawIp));
    }
}
