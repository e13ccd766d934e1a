//! Typed values accepted on the command line.
//!
//! Every parser returns a plain `String` describing the problem; the caller
//! wraps it into a configuration error so the message reads the same whether
//! it came from a flag or from a configuration file.

use crate::core::protocol::{Cid, LinkProtocol, NetOpenFlags};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parse a client ID in the range 1..=255.
pub fn parse_cid(value: &str) -> Result<Cid, String> {
    parse_uint(value)
        .and_then(|n| u8::try_from(n).ok())
        .and_then(Cid::new)
        .ok_or_else(|| format!("invalid cid given: '{}'", value))
}

/// Parse a device instance ID in the range 0..=255.
pub fn parse_instance_id(value: &str) -> Result<u8, String> {
    let id = parse_uint(value).ok_or_else(|| format!("invalid instance id given: '{}'", value))?;
    u8::try_from(id).map_err(|_| {
        format!(
            "given instance id is out of range: '{}' (max {})",
            value,
            u8::MAX
        )
    })
}

/// Parse a WDS packet data handle; zero is not a valid handle.
pub fn parse_packet_data_handle(value: &str) -> Result<u32, String> {
    parse_uint(value)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n != 0)
        .ok_or_else(|| format!("invalid packet data handle given: '{}'", value))
}

/// Unsigned decimal made only of ASCII digits.
fn parse_uint(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Parse `--device-open-net` flags, e.g. `net-raw-ip|net-no-qos-header`.
///
/// Exactly one link protocol and exactly one QoS header choice must be given.
pub fn parse_net_open_flags(value: &str) -> Result<NetOpenFlags, String> {
    let mut ieee8023 = false;
    let mut raw_ip = false;
    let mut qos = false;
    let mut no_qos = false;
    let mut any = false;

    for item in value.split('|').filter(|item| !item.is_empty()) {
        match item {
            "net-802-3" => ieee8023 = true,
            "net-raw-ip" => raw_ip = true,
            "net-qos-header" => qos = true,
            "net-no-qos-header" => no_qos = true,
            other => return Err(format!("invalid net open flags value given: '{}'", other)),
        }
        any = true;
    }

    if !any {
        return Err(format!("invalid net open flags input given: '{}'", value));
    }
    if ieee8023 && raw_ip {
        return Err("cannot give both 802.3 and raw-IP options".to_string());
    }
    if qos && no_qos {
        return Err("cannot request both QoS and no-QoS headers".to_string());
    }

    let link_protocol = match (ieee8023, raw_ip) {
        (true, _) => LinkProtocol::Ieee8023,
        (_, true) => LinkProtocol::RawIp,
        _ => return Err("missing link protocol (802.3 or raw IP)".to_string()),
    };
    if !qos && !no_qos {
        return Err("missing QoS or no-QoS header request".to_string());
    }

    Ok(NetOpenFlags {
        link_protocol,
        qos_header: qos,
    })
}

/// Generates a kebab-case keyword enum with `FromStr`, `Display` and serde
/// support sharing the same nicknames.
macro_rules! keyword_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $what:literal {
            $($variant:ident => $nick:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $nick)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $nick,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($nick => Ok($name::$variant),)+
                    _ => Err(format!(concat!("invalid ", $what, " value given: '{}'"), s)),
                }
            }
        }
    };
}

keyword_enum! {
    /// DMS operating mode.
    OperatingMode, "operating mode" {
        Online => "online",
        LowPower => "low-power",
        FactoryTest => "factory-test",
        Offline => "offline",
        Reset => "reset",
        ShuttingDown => "shutting-down",
        PersistentLowPower => "persistent-low-power",
        ModeOnlyLowPower => "mode-only-low-power",
    }
}

keyword_enum! {
    /// NAS radio interface.
    RadioInterface, "radio interface" {
        None => "none",
        Cdma1x => "cdma-1x",
        Cdma1xEvdo => "cdma-1xevdo",
        Amps => "amps",
        Gsm => "gsm",
        Umts => "umts",
        Lte => "lte",
        TdScdma => "td-scdma",
    }
}

keyword_enum! {
    /// Single radio access technology inside a mode preference.
    RatMode, "rat mode pref" {
        Cdma1x => "cdma-1x",
        Cdma1xEvdo => "cdma-1xevdo",
        Gsm => "gsm",
        Umts => "umts",
        Lte => "lte",
        TdScdma => "td-scdma",
    }
}

keyword_enum! {
    /// WDS profile family.
    ProfileType, "profile type" {
        ThreeGpp => "3gpp",
        ThreeGpp2 => "3gpp2",
    }
}

keyword_enum! {
    /// Authentication used when bringing up a data session.
    AuthPreference, "authentication" {
        None => "none",
        Pap => "pap",
        Chap => "chap",
        Both => "both",
    }
}

/// Set of radio access technologies, written as `gsm|umts|lte`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatModePreference(Vec<RatMode>);

impl FromStr for RatModePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut modes = Vec::new();
        for item in s.split('|').filter(|item| !item.is_empty()) {
            let mode: RatMode = item.parse()?;
            if !modes.contains(&mode) {
                modes.push(mode);
            }
        }
        if modes.is_empty() {
            return Err(format!("invalid rat mode pref input given: '{}'", s));
        }
        Ok(Self(modes))
    }
}

impl fmt::Display for RatModePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(RatMode::as_str).collect();
        f.write_str(&names.join("|"))
    }
}

/// Parameters for `--wds-start-network`: `APN[,PAP|CHAP|BOTH[,USER[,PASSWORD]]]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartNetworkInput {
    pub apn: Option<String>,
    pub auth: Option<AuthPreference>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl FromStr for StartNetworkInput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // An empty argument starts the network with the modem defaults.
        if s.is_empty() {
            return Ok(Self::default());
        }

        let mut fields = s.split(',');
        let apn = fields.next().map(str::to_string);
        let auth = fields.next().map(|auth| match auth.to_ascii_lowercase().as_str() {
            "pap" => AuthPreference::Pap,
            "chap" => AuthPreference::Chap,
            "both" => AuthPreference::Both,
            _ => AuthPreference::None,
        });
        let username = auth
            .and(fields.next())
            .filter(|user| !user.is_empty())
            .map(str::to_string);
        let password = username
            .as_ref()
            .and(fields.next())
            .filter(|pass| !pass.is_empty())
            .map(str::to_string);

        Ok(Self {
            apn,
            auth,
            username,
            password,
        })
    }
}

/// UIM file location: the parent path followed by the file id, e.g.
/// `0x3F00,0x7FFF,0x6F07`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UimFilePath {
    pub path: Vec<u16>,
    pub file_id: u16,
}

impl FromStr for UimFilePath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid file path given: '{}'", s);

        let mut items = s
            .split(',')
            .map(|item| {
                let digits = item
                    .trim()
                    .trim_start_matches("0x")
                    .trim_start_matches("0X");
                u16::from_str_radix(digits, 16).map_err(|_| invalid())
            })
            .collect::<Result<Vec<u16>, String>>()?;

        let file_id = items.pop().filter(|id| *id != 0).ok_or_else(invalid)?;
        Ok(Self {
            path: items,
            file_id,
        })
    }
}

impl fmt::Display for UimFilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.path {
            write!(f, "0x{:04X},", item)?;
        }
        write!(f, "0x{:04X}", self.file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cid() {
        assert_eq!(parse_cid("5").unwrap().value(), 5);
        assert_eq!(parse_cid("255").unwrap().value(), 255);
        assert!(parse_cid("0").is_err());
        assert!(parse_cid("256").is_err());
        assert!(parse_cid("-1").is_err());
        assert!(parse_cid("abc").is_err());
        assert!(parse_cid("").is_err());
    }

    #[test]
    fn test_parse_instance_id() {
        assert_eq!(parse_instance_id("0").unwrap(), 0);
        assert_eq!(parse_instance_id("12").unwrap(), 12);
        let err = parse_instance_id("300").unwrap_err();
        assert!(err.contains("out of range"));
        assert!(parse_instance_id("x1").unwrap_err().contains("invalid instance id"));
    }

    #[test]
    fn test_parse_packet_data_handle() {
        assert_eq!(parse_packet_data_handle("1234567").unwrap(), 1234567);
        assert!(parse_packet_data_handle("0").is_err());
        assert!(parse_packet_data_handle("4294967296").is_err());
    }

    #[test]
    fn test_net_open_flags() {
        let flags = parse_net_open_flags("net-raw-ip|net-no-qos-header").unwrap();
        assert_eq!(flags.link_protocol, LinkProtocol::RawIp);
        assert!(!flags.qos_header);

        let flags = parse_net_open_flags("net-qos-header|net-802-3").unwrap();
        assert_eq!(flags.link_protocol, LinkProtocol::Ieee8023);
        assert!(flags.qos_header);
    }

    #[test]
    fn test_net_open_flags_rejects_inconsistent_input() {
        assert!(parse_net_open_flags("").is_err());
        assert!(parse_net_open_flags("net-raw-ip").unwrap_err().contains("QoS"));
        assert!(parse_net_open_flags("net-qos-header").unwrap_err().contains("link protocol"));
        assert!(parse_net_open_flags("net-802-3|net-raw-ip|net-qos-header").is_err());
        assert!(parse_net_open_flags("net-802-3|net-qos-header|net-no-qos-header").is_err());
        assert!(parse_net_open_flags("net-802-3|bogus").unwrap_err().contains("bogus"));
    }

    #[test]
    fn test_keyword_enums() {
        assert_eq!("low-power".parse::<OperatingMode>().unwrap(), OperatingMode::LowPower);
        assert_eq!("lte".parse::<RadioInterface>().unwrap(), RadioInterface::Lte);
        assert_eq!("3gpp2".parse::<ProfileType>().unwrap(), ProfileType::ThreeGpp2);
        assert!("warp".parse::<RadioInterface>().unwrap_err().contains("radio interface"));
        assert_eq!(OperatingMode::PersistentLowPower.to_string(), "persistent-low-power");
    }

    #[test]
    fn test_rat_mode_preference() {
        let pref: RatModePreference = "gsm|umts||lte|gsm".parse().unwrap();
        assert_eq!(pref, RatModePreference(vec![RatMode::Gsm, RatMode::Umts, RatMode::Lte]));
        assert_eq!(pref.to_string(), "gsm|umts|lte");
        assert!("|".parse::<RatModePreference>().is_err());
        assert!("gsm|5g".parse::<RatModePreference>().is_err());
    }

    #[test]
    fn test_start_network_input() {
        let input: StartNetworkInput = "internet,CHAP,alice,secret".parse().unwrap();
        assert_eq!(input.apn.as_deref(), Some("internet"));
        assert_eq!(input.auth, Some(AuthPreference::Chap));
        assert_eq!(input.username.as_deref(), Some("alice"));
        assert_eq!(input.password.as_deref(), Some("secret"));

        let input: StartNetworkInput = "internet,weird".parse().unwrap();
        assert_eq!(input.auth, Some(AuthPreference::None));
        assert!(input.username.is_none());

        let input: StartNetworkInput = "apn,pap,,secret".parse().unwrap();
        assert!(input.username.is_none());
        assert!(input.password.is_none());

        assert_eq!("".parse::<StartNetworkInput>().unwrap(), StartNetworkInput::default());
    }

    #[test]
    fn test_uim_file_path() {
        let path: UimFilePath = "0x3F00,0x7FFF,0x6F07".parse().unwrap();
        assert_eq!(path.path, vec![0x3F00, 0x7FFF]);
        assert_eq!(path.file_id, 0x6F07);
        assert_eq!(path.to_string(), "0x3F00,0x7FFF,0x6F07");

        assert!("0x3F00,0x0000".parse::<UimFilePath>().is_err());
        assert!("zz".parse::<UimFilePath>().is_err());
    }
}
