//! Protocol constants
//!
//! Service, object type and property identifiers are 16/8-bit newtypes so a
//! wrongly sized field cannot be built.

use std::fmt;
use std::str::FromStr;

use errors::XcomError;
use serde::{Deserialize, Serialize};

/// First byte of every package
pub const START_BYTE: u8 = 0xAA;
/// Single stray byte some gateways emit before the start byte
pub const STRAY_BYTE: u8 = 0xFF;
/// Maximum package length on every transport
pub const MSG_MAX_LENGTH: usize = 256;
/// Line terminator appended to packages on the serial link
pub const SERIAL_TERMINATOR: [u8; 2] = [0x0D, 0x0A];

/// frame_flags + src_addr + dst_addr + data_length
pub const HEADER_LEN: usize = 11;
pub const CHECKSUM_LEN: usize = 2;
/// service_flags + service_id + object_type + object_id + property_id
pub const FRAME_FIXED_LEN: usize = 10;

pub const DEFAULT_SRC_ADDR: u32 = 1;
pub const DEFAULT_DST_ADDR: u32 = 0;
/// First inverter, addresses the whole Xtender group
pub const DEVICE_DST_ADDR: u32 = 100;

/// service_flags bit 0
pub const FLAG_ERROR: u8 = 0x01;
/// service_flags bit 1
pub const FLAG_RESPONSE: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(pub u8);

impl ServiceId {
    pub const READ_PROPERTY: Self = Self(0x01);
    pub const WRITE_PROPERTY: Self = Self(0x02);
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::READ_PROPERTY => f.write_str("READ_PROPERTY"),
            Self::WRITE_PROPERTY => f.write_str("WRITE_PROPERTY"),
            Self(other) => write!(f, "0x{other:02X}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectType(pub u16);

impl ObjectType {
    pub const INFO: Self = Self(0x0001);
    pub const PARAMETER: Self = Self(0x0002);
    pub const MESSAGE: Self = Self(0x0003);
    pub const GUID: Self = Self(0x0004);
    pub const DATALOG: Self = Self(0x0005);

    /// INFO for identifiers in the info ranges, PARAMETER otherwise
    pub fn for_id(id: u32) -> Self {
        if xcom_model::is_info_id(id) {
            Self::INFO
        } else {
            Self::PARAMETER
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::INFO => "INFO",
            Self::PARAMETER => "PARAMETER",
            Self::MESSAGE => "MESSAGE",
            Self::GUID => "GUID",
            Self::DATALOG => "DATALOG",
            Self(other) => return write!(f, "0x{other:04X}"),
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub u16);

impl PropertyId {
    pub const VALUE: Self = Self(0x0005);
    pub const MIN: Self = Self(0x0006);
    pub const MAX: Self = Self(0x0007);
    pub const LEVEL: Self = Self(0x0008);
    /// Value kept in RAM only, not written to flash
    pub const UNSAVED_VALUE: Self = Self(0x000D);
}

impl Default for PropertyId {
    fn default() -> Self {
        Self::UNSAVED_VALUE
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::VALUE => "VALUE",
            Self::MIN => "MIN",
            Self::MAX => "MAX",
            Self::LEVEL => "LEVEL",
            Self::UNSAVED_VALUE => "UNSAVED_VALUE",
            Self(other) => return write!(f, "0x{other:04X}"),
        };
        f.write_str(name)
    }
}

/// Accepts the property names shown by `Display` or a numeric id (`13`, `0x000D`)
impl FromStr for PropertyId {
    type Err = XcomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.to_ascii_uppercase().as_str() {
            "VALUE" => Some(Self::VALUE),
            "MIN" => Some(Self::MIN),
            "MAX" => Some(Self::MAX),
            "LEVEL" => Some(Self::LEVEL),
            "UNSAVED_VALUE" | "UNSAVED" => Some(Self::UNSAVED_VALUE),
            other => match other.strip_prefix("0X") {
                Some(hex) => u16::from_str_radix(hex, 16).ok().map(Self),
                None => other.parse().ok().map(Self),
            },
        };
        parsed.ok_or_else(|| XcomError::config(format!("Unknown property id: {s}")))
    }
}

/// Access level written to the LEVEL property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QspLevel {
    ViewOnly,
    Basic,
    Expert,
    Installer,
    Qsp,
}

impl QspLevel {
    pub fn code(&self) -> u16 {
        match self {
            QspLevel::ViewOnly => 0x0000,
            QspLevel::Basic => 0x0010,
            QspLevel::Expert => 0x0020,
            QspLevel::Installer => 0x0030,
            QspLevel::Qsp => 0x0040,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0000 => Some(QspLevel::ViewOnly),
            0x0010 => Some(QspLevel::Basic),
            0x0020 => Some(QspLevel::Expert),
            0x0030 => Some(QspLevel::Installer),
            0x0040 => Some(QspLevel::Qsp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QspLevel::ViewOnly => "VIEW_ONLY",
            QspLevel::Basic => "BASIC",
            QspLevel::Expert => "EXPERT",
            QspLevel::Installer => "INSTALLER",
            QspLevel::Qsp => "QSP",
        }
    }
}

impl fmt::Display for QspLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QspLevel {
    type Err = XcomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "VIEW_ONLY" | "VIEW" => Ok(QspLevel::ViewOnly),
            "BASIC" => Ok(QspLevel::Basic),
            "EXPERT" => Ok(QspLevel::Expert),
            "INSTALLER" => Ok(QspLevel::Installer),
            "QSP" => Ok(QspLevel::Qsp),
            _ => Err(XcomError::config(format!("Unknown access level: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_type_for_id() {
        assert_eq!(ObjectType::for_id(3011), ObjectType::INFO);
        assert_eq!(ObjectType::for_id(11016), ObjectType::INFO);
        assert_eq!(ObjectType::for_id(1138), ObjectType::PARAMETER);
        assert_eq!(ObjectType::for_id(6062), ObjectType::PARAMETER);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ServiceId::READ_PROPERTY.to_string(), "READ_PROPERTY");
        assert_eq!(ServiceId(0x7F).to_string(), "0x7F");
        assert_eq!(PropertyId::UNSAVED_VALUE.to_string(), "UNSAVED_VALUE");
        assert_eq!(ObjectType(0x0009).to_string(), "0x0009");
    }

    #[test]
    fn test_property_from_str() {
        assert_eq!("value".parse::<PropertyId>().ok(), Some(PropertyId::VALUE));
        assert_eq!("unsaved_value".parse::<PropertyId>().ok(), Some(PropertyId::UNSAVED_VALUE));
        assert_eq!("0x000D".parse::<PropertyId>().ok(), Some(PropertyId::UNSAVED_VALUE));
        assert_eq!("8".parse::<PropertyId>().ok(), Some(PropertyId::LEVEL));
        assert!("flash".parse::<PropertyId>().is_err());
    }

    #[test]
    fn test_qsp_levels() {
        for level in [
            QspLevel::ViewOnly,
            QspLevel::Basic,
            QspLevel::Expert,
            QspLevel::Installer,
            QspLevel::Qsp,
        ] {
            assert_eq!(QspLevel::from_code(level.code()), Some(level));
        }
        assert_eq!(QspLevel::Installer.code(), 0x0030);
        assert!(QspLevel::from_code(0x0015).is_none());
        assert_eq!("view-only".parse::<QspLevel>().ok(), Some(QspLevel::ViewOnly));
        assert_eq!("expert".parse::<QspLevel>().ok(), Some(QspLevel::Expert));
        assert_eq!(QspLevel::Qsp.to_string(), "QSP");
        assert!("root".parse::<QspLevel>().is_err());
    }
}
