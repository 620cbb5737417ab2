//! Datapoint metadata
//!
//! A [`Datapoint`] describes one addressable device parameter: its numeric
//! identifier, a symbolic name, the declared scalar type and an optional unit.
//! Identity is the identifier alone, so two datapoints with the same id but
//! different names compare equal.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use errors::XcomError;
use serde::{Deserialize, Serialize};

/// First identifier of the Xtender info range
pub const INFO_RANGE_START: u32 = 3000;
/// Last identifier of the Xtender info range (inclusive)
pub const INFO_RANGE_END: u32 = 3168;
/// Every identifier from here on (BSP, VarioTrack, VarioString) is an info
pub const INFO_OPEN_RANGE_START: u32 = 7000;

/// Whether an identifier addresses a read-only "info" object on the device
pub fn is_info_id(id: u32) -> bool {
    (INFO_RANGE_START..=INFO_RANGE_END).contains(&id) || id >= INFO_OPEN_RANGE_START
}

/// Declared scalar type of a datapoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Bool,
    #[serde(rename = "INTEGER")]
    Int32,
    Float,
    EnumShort,
    EnumLong,
    String,
    Bytes,
}

impl DataType {
    /// Name as used by the device documentation
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Bool => "BOOL",
            DataType::Int32 => "INTEGER",
            DataType::Float => "FLOAT",
            DataType::EnumShort => "ENUM_SHORT",
            DataType::EnumLong => "ENUM_LONG",
            DataType::String => "STRING",
            DataType::Bytes => "BYTES",
        }
    }

    /// Fixed wire width in bytes, `None` for types without a scalar encoding
    pub fn wire_width(&self) -> Option<usize> {
        match self {
            DataType::Bool => Some(1),
            DataType::EnumShort => Some(2),
            DataType::Int32 | DataType::Float => Some(4),
            DataType::EnumLong | DataType::String | DataType::Bytes => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = XcomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Ok(DataType::Bool),
            "integer" | "int" | "int32" | "i32" | "sint" => Ok(DataType::Int32),
            "float" | "float32" | "f32" => Ok(DataType::Float),
            "enum_short" | "short_enum" | "enum" => Ok(DataType::EnumShort),
            "enum_long" | "long_enum" => Ok(DataType::EnumLong),
            "string" => Ok(DataType::String),
            "bytes" => Ok(DataType::Bytes),
            other => Err(XcomError::UnsupportedType(other.to_string())),
        }
    }
}

/// Metadata of one device parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Datapoint {
    pub id: u32,
    pub name: String,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub writable: bool,
}

impl Datapoint {
    /// Writable parameter without unit
    pub fn parameter(id: u32, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id,
            name: name.into(),
            data_type,
            unit: None,
            writable: true,
        }
    }

    /// Read-only info value
    pub fn info(id: u32, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            writable: false,
            ..Self::parameter(id, name, data_type)
        }
    }

    /// Anonymous datapoint for reads by raw identifier
    pub fn anonymous(id: u32, data_type: DataType) -> Self {
        Self {
            id,
            name: String::new(),
            data_type,
            unit: None,
            writable: !is_info_id(id),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn is_info(&self) -> bool {
        is_info_id(self.id)
    }
}

impl PartialEq for Datapoint {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Datapoint {}

impl PartialEq<u32> for Datapoint {
    fn eq(&self, other: &u32) -> bool {
        self.id == *other
    }
}

impl Hash for Datapoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Datapoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{} ({})", self.id, self.data_type)
        } else {
            write!(f, "{} {} ({})", self.id, self.name, self.data_type)
        }
    }
}

/// Labelled value of an enumerated parameter (operating mode, cycle phase)
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ValueTuple {
    pub id: i32,
    pub label: &'static str,
}

impl ValueTuple {
    pub const fn new(id: i32, label: &'static str) -> Self {
        Self { id, label }
    }
}

impl PartialEq for ValueTuple {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ValueTuple {}

impl PartialEq<i32> for ValueTuple {
    fn eq(&self, other: &i32) -> bool {
        self.id == *other
    }
}

impl fmt::Display for ValueTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label)
    }
}
