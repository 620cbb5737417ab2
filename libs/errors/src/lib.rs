//! Unified error handling for the Xcom crates
//!
//! Every layer (wire codec, value codec, transports, session) reports failures
//! through [`XcomError`], so a caller of `read_parameter`/`write_parameter`
//! can tell exactly which stage failed.

use thiserror::Error;

// ============================================================================
// XcomError - Main error type
// ============================================================================

/// Main error type for all Xcom crates
#[derive(Debug, Error)]
pub enum XcomError {
    // ======================================
    // Codec Errors
    // ======================================
    /// Bad start byte, checksum mismatch or truncated buffer
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Unsupported value type: {0}")]
    UnsupportedType(String),

    #[error("Truncated value: {data_type} needs {expected} bytes, got {actual}")]
    TruncatedValue {
        data_type: String,
        expected: usize,
        actual: usize,
    },

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),

    // ======================================
    // Exchange Errors
    // ======================================
    #[error("Timeout waiting for response from {0}")]
    Timeout(String),

    /// Device answered with the error flag set
    #[error("Device error 0x{code:04X}: {label}")]
    Protocol { code: u16, label: String },

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    /// Reply did not carry the response flag or did not match the request
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    // ======================================
    // Parameter Table Errors
    // ======================================
    #[error("Unknown datapoint: {0}")]
    UnknownDatapoint(String),

    #[error("Parameter {0} is read-only")]
    ReadOnlyParameter(u32),

    // ======================================
    // Transport & Runtime Errors
    // ======================================
    #[error("Connection failed: {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias using XcomError
pub type XcomResult<T> = Result<T, XcomError>;

impl XcomError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedFrame(msg.into())
    }

    pub fn timeout(endpoint: impl Into<String>) -> Self {
        Self::Timeout(endpoint.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn connection(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConnectionFailed {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// Short stable name of the error kind, used in CLI output and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedFrame(_) => "malformed_frame",
            Self::UnsupportedType(_) => "unsupported_type",
            Self::TruncatedValue { .. } => "truncated_value",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::ValueOutOfRange(_) => "value_out_of_range",
            Self::Timeout(_) => "timeout",
            Self::Protocol { .. } => "protocol_error",
            Self::EmptyResponse(_) => "empty_response",
            Self::UnexpectedResponse(_) => "unexpected_response",
            Self::UnknownDatapoint(_) => "unknown_datapoint",
            Self::ReadOnlyParameter(_) => "read_only_parameter",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::Io(_) => "io",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Check if this error is retryable
    ///
    /// Only transport-level conditions qualify; a device error or a codec
    /// failure will repeat identically on a resend.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::EmptyResponse(_) | Self::ConnectionFailed { .. } | Self::Io(_)
        )
    }
}
