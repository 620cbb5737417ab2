//! Studer Xcom protocol codec
//!
//! Byte-exact framing of Xcom packages (start byte, header, frame, two rolling
//! checksums), typed value encoding and the device error-code table. Pure
//! functions only; transports live in the `xcom` service crate.

pub mod checksum;
pub mod constants;
pub mod error_code;
pub mod package;
pub mod value;

pub use checksum::checksum;
pub use constants::{
    ObjectType, PropertyId, QspLevel, ServiceId, DEVICE_DST_ADDR, MSG_MAX_LENGTH,
    SERIAL_TERMINATOR,
};
pub use error_code::{check_response, classify, ErrorCode, ERROR_CODES};
pub use package::{
    assemble, build_request, complete_len, parse, parse_prefix, Frame, Header, Package, Service,
};
pub use value::{decode, encode, Value};
