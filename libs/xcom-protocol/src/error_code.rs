//! Device error codes
//!
//! An error response carries its code as the first two bytes (LE) of
//! `property_data`.

use errors::{XcomError, XcomResult};
use serde::Serialize;
use tracing::warn;

use crate::package::Package;

pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorCode {
    pub code: u16,
    pub label: &'static str,
}

const fn entry(code: u16, label: &'static str) -> ErrorCode {
    ErrorCode { code, label }
}

/// Error codes documented for the Xcom gateway
pub const ERROR_CODES: [ErrorCode; 23] = [
    entry(0x0001, "INVALID_FRAME"),
    entry(0x0002, "DEVICE_NOT_FOUND"),
    entry(0x0003, "RESPONSE_TIMEOUT"),
    entry(0x0011, "SERVICE_NOT_SUPPORTED"),
    entry(0x0012, "INVALID_SERVICE_ARGUMENT"),
    entry(0x0013, "SCOM_ERROR_GATEWAY_BUSY"),
    entry(0x0021, "TYPE_NOT_SUPPORTED"),
    entry(0x0022, "OBJECT_ID_NOT_FOUND"),
    entry(0x0023, "PROPERTY_NOT_SUPPORTED"),
    entry(0x0024, "INVALID_DATA_LENGTH"),
    entry(0x0025, "PROPERTY_IS_READ_ONLY"),
    entry(0x0026, "INVALID_DATA"),
    entry(0x0027, "DATA_TOO_SMALL"),
    entry(0x0028, "DATA_TOO_BIG"),
    entry(0x0029, "WRITE_PROPERTY_FAILED"),
    entry(0x002A, "READ_PROPERTY_FAILED"),
    entry(0x002B, "ACCESS_DENIED"),
    entry(0x002C, "SCOM_ERROR_OBJECT_NOT_SUPPORTED"),
    entry(0x002D, "SCOM_ERROR_MULTICAST_READ_NOT_SUPPORTED"),
    entry(0x002E, "OBJECT_PROPERTY_INVALID"),
    entry(0x002F, "FILE_OR_DIR_NOT_PRESENT"),
    entry(0x0030, "FILE_CORRUPTED"),
    entry(0x0081, "INVALID_SHELL_ARG"),
];

/// Label of a code, `UNKNOWN_ERROR` when unmapped
pub fn label(code: u16) -> &'static str {
    ERROR_CODES
        .iter()
        .find(|e| e.code == code)
        .map_or(UNKNOWN_ERROR, |e| e.label)
}

/// Code and label carried by an error payload
///
/// A payload shorter than two bytes has no readable code and maps to
/// `UNKNOWN_ERROR` with code 0.
pub fn classify(payload: &[u8]) -> ErrorCode {
    match payload {
        [lo, hi, ..] => {
            let code = u16::from_le_bytes([*lo, *hi]);
            entry(code, label(code))
        }
        _ => entry(0, UNKNOWN_ERROR),
    }
}

/// Validate a reply: error flag first, then the response flag
pub fn check_response(reply: &Package) -> XcomResult<&Package> {
    if let Some(payload) = reply.error_payload() {
        let ErrorCode { code, label } = classify(payload);
        warn!(code = %format!("0x{code:04X}"), label, "Device returned error");
        return Err(XcomError::Protocol {
            code,
            label: label.to_string(),
        });
    }
    if !reply.is_response() {
        return Err(XcomError::UnexpectedResponse(format!(
            "response flag not set (service_flags=0x{:02X})",
            reply.frame.service_flags
        )));
    }
    Ok(reply)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::constants::{ObjectType, PropertyId, ServiceId, FLAG_ERROR, FLAG_RESPONSE};

    fn reply(flags: u8, data: &'static [u8]) -> Package {
        let mut pkg = Package::request(
            ServiceId::READ_PROPERTY,
            ObjectType::INFO,
            3011,
            PropertyId::VALUE,
            bytes::Bytes::from_static(data),
        );
        pkg.frame.service_flags = flags;
        pkg
    }

    #[test]
    fn test_table_is_unique() {
        let mut codes: Vec<u16> = ERROR_CODES.iter().map(|e| e.code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), ERROR_CODES.len());
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&[0x22, 0x00]).label, "OBJECT_ID_NOT_FOUND");
        assert_eq!(classify(&[0x81, 0x00, 0xFF]).label, "INVALID_SHELL_ARG");
        assert_eq!(classify(&[0x99, 0x00]), entry(0x99, UNKNOWN_ERROR));
        assert_eq!(classify(&[0x22]).label, UNKNOWN_ERROR);
        assert_eq!(classify(&[]).code, 0);
    }

    #[test]
    fn test_check_response_ok() {
        let pkg = reply(FLAG_RESPONSE, &[0x00, 0x00, 0x66, 0x43]);
        assert!(check_response(&pkg).is_ok());
    }

    #[test]
    fn test_check_response_error() {
        let pkg = reply(FLAG_RESPONSE | FLAG_ERROR, &[0x22, 0x00]);
        match check_response(&pkg).unwrap_err() {
            XcomError::Protocol { code, label } => {
                assert_eq!(code, 0x22);
                assert_eq!(label, "OBJECT_ID_NOT_FOUND");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_check_response_not_a_response() {
        let pkg = reply(0, &[]);
        assert!(matches!(
            check_response(&pkg),
            Err(XcomError::UnexpectedResponse(_))
        ));
    }
}
