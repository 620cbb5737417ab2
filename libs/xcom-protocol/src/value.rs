//! Typed parameter values
//!
//! | type       | width | encoding                                   |
//! |------------|-------|--------------------------------------------|
//! | BOOL       | 1     | 0x00 / 0x01, any nonzero byte decodes true |
//! | INTEGER    | 4     | i32 little-endian                          |
//! | FLOAT      | 4     | IEEE-754 f32 little-endian                 |
//! | ENUM_SHORT | 2     | decoded as i16, encoded as u16             |

use std::fmt;

use bytes::Bytes;
use errors::{XcomError, XcomResult};
use serde::Serialize;
use xcom_model::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Float(f32),
    ShortEnum(i32),
}

impl Value {
    /// Scalar type this variant encodes as
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Bool(_) => DataType::Bool,
            Value::Int(_) => DataType::Int32,
            Value::Float(_) => DataType::Float,
            Value::ShortEnum(_) => DataType::EnumShort,
        }
    }

    /// Integer view for enum and integer values
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Value::Int(i) | Value::ShortEnum(i) => Some(i),
            Value::Bool(b) => Some(i32::from(b)),
            Value::Float(_) => None,
        }
    }

    /// Parse user input according to the declared type
    pub fn parse(data_type: DataType, text: &str) -> XcomResult<Self> {
        let text = text.trim();
        let invalid = || XcomError::TypeMismatch {
            expected: data_type.to_string(),
            actual: format!("{text:?}"),
        };

        match data_type {
            DataType::Bool => match text.to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => Ok(Value::Bool(true)),
                "0" | "false" | "off" | "no" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            DataType::Int32 => text.parse().map(Value::Int).map_err(|_| invalid()),
            DataType::Float => text.parse().map(Value::Float).map_err(|_| invalid()),
            DataType::EnumShort => text.parse().map(Value::ShortEnum).map_err(|_| invalid()),
            other => Err(XcomError::UnsupportedType(other.to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) | Value::ShortEnum(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

/// Encode `value` as the wire bytes of `data_type`
pub fn encode(data_type: DataType, value: &Value) -> XcomResult<Bytes> {
    let bytes = match (data_type, *value) {
        (DataType::Bool, Value::Bool(b)) => vec![u8::from(b)],
        (DataType::Int32, Value::Int(i)) => i32::to_le_bytes(i).to_vec(),
        (DataType::Float, Value::Float(f)) => f32::to_le_bytes(f).to_vec(),
        (DataType::EnumShort, Value::ShortEnum(e)) => {
            let raw = u16::try_from(e).map_err(|_| {
                XcomError::ValueOutOfRange(format!("{e} does not fit an unsigned 16-bit enum"))
            })?;
            raw.to_le_bytes().to_vec()
        }
        (DataType::Bool | DataType::Int32 | DataType::Float | DataType::EnumShort, other) => {
            return Err(XcomError::TypeMismatch {
                expected: data_type.to_string(),
                actual: other.data_type().to_string(),
            })
        }
        (unsupported, _) => return Err(XcomError::UnsupportedType(unsupported.to_string())),
    };
    Ok(Bytes::from(bytes))
}

/// Decode wire bytes of `data_type`; the length must match the type width exactly
pub fn decode(data_type: DataType, bytes: &[u8]) -> XcomResult<Value> {
    let width = data_type
        .wire_width()
        .ok_or_else(|| XcomError::UnsupportedType(data_type.to_string()))?;
    if bytes.len() != width {
        return Err(XcomError::TruncatedValue {
            data_type: data_type.to_string(),
            expected: width,
            actual: bytes.len(),
        });
    }

    let value = match (data_type, bytes) {
        (DataType::Bool, [b]) => Value::Bool(*b != 0),
        (DataType::Int32, &[a, b, c, d]) => Value::Int(i32::from_le_bytes([a, b, c, d])),
        (DataType::Float, &[a, b, c, d]) => Value::Float(f32::from_le_bytes([a, b, c, d])),
        (DataType::EnumShort, &[a, b]) => Value::ShortEnum(i32::from(i16::from_le_bytes([a, b]))),
        _ => return Err(XcomError::UnsupportedType(data_type.to_string())),
    };
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_encode_float() {
        let bytes = encode(DataType::Float, &Value::Float(12.5)).unwrap();
        assert_eq!(&bytes[..], &[0x00, 0x00, 0x48, 0x41]);
    }

    #[test]
    fn test_encode_enum_unsigned() {
        let bytes = encode(DataType::EnumShort, &Value::ShortEnum(5)).unwrap();
        assert_eq!(&bytes[..], &[0x05, 0x00]);
        let bytes = encode(DataType::EnumShort, &Value::ShortEnum(65535)).unwrap();
        assert_eq!(&bytes[..], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_encode_enum_out_of_range() {
        for v in [-1, 65536] {
            let err = encode(DataType::EnumShort, &Value::ShortEnum(v)).unwrap_err();
            assert!(matches!(err, XcomError::ValueOutOfRange(_)));
        }
    }

    #[test]
    fn test_decode_enum_signed() {
        assert_eq!(
            decode(DataType::EnumShort, &[0xFF, 0xFF]).unwrap(),
            Value::ShortEnum(-1)
        );
    }

    #[test]
    fn test_decode_bool_nonzero() {
        assert_eq!(decode(DataType::Bool, &[0x02]).unwrap(), Value::Bool(true));
        assert_eq!(decode(DataType::Bool, &[0x00]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_decode_wrong_width() {
        let err = decode(DataType::Float, &[0x00, 0x00, 0x48]).unwrap_err();
        assert!(matches!(
            err,
            XcomError::TruncatedValue {
                expected: 4,
                actual: 3,
                ..
            }
        ));
        assert!(decode(DataType::Bool, &[]).is_err());
        assert!(decode(DataType::Int32, &[0; 5]).is_err());
    }

    #[test]
    fn test_unsupported_types() {
        for t in [DataType::EnumLong, DataType::String, DataType::Bytes] {
            assert!(matches!(
                decode(t, &[0; 4]),
                Err(XcomError::UnsupportedType(_))
            ));
            assert!(matches!(
                encode(t, &Value::Int(1)),
                Err(XcomError::UnsupportedType(_))
            ));
        }
    }

    #[test]
    fn test_type_mismatch() {
        let err = encode(DataType::Float, &Value::Int(12)).unwrap_err();
        assert!(matches!(err, XcomError::TypeMismatch { .. }));
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(Value::parse(DataType::Float, "12.5").unwrap(), Value::Float(12.5));
        assert_eq!(Value::parse(DataType::Bool, "on").unwrap(), Value::Bool(true));
        assert_eq!(Value::parse(DataType::Int32, " -7 ").unwrap(), Value::Int(-7));
        assert_eq!(
            Value::parse(DataType::EnumShort, "3").unwrap(),
            Value::ShortEnum(3)
        );
        assert!(Value::parse(DataType::Int32, "1.5").is_err());
        assert!(Value::parse(DataType::String, "x").is_err());
    }

    #[test]
    fn test_display_and_json() {
        assert_eq!(Value::Float(230.0).to_string(), "230");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(serde_json::to_string(&Value::ShortEnum(-1)).unwrap(), "-1");
    }
}
