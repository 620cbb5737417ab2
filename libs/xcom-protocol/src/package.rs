//! Xcom package framing
//!
//! ```text
//! Package = 0xAA  Header  checksum(Header)  Frame  checksum(Frame)
//! Header  = frame_flags:u8  src_addr:u32  dst_addr:u32  data_length:u16
//! Frame   = service_flags:u8  service_id:u8  Service
//! Service = object_type:u16  object_id:u32  property_id:u16  property_data
//! ```
//!
//! All multi-byte fields are little-endian. `data_length` is the encoded frame
//! length: it is checked when assembling and trusted when parsing.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use errors::{XcomError, XcomResult};

use crate::checksum::{checksum, verify};
use crate::constants::{
    ObjectType, PropertyId, ServiceId, CHECKSUM_LEN, DEFAULT_DST_ADDR, DEFAULT_SRC_ADDR,
    FLAG_ERROR, FLAG_RESPONSE, FRAME_FIXED_LEN, HEADER_LEN, START_BYTE, STRAY_BYTE,
};

/// Offset of `data_length` inside the header
const DATA_LENGTH_OFFSET: usize = 9;

// ============================================================================
// Service
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub object_type: ObjectType,
    pub object_id: u32,
    pub property_id: PropertyId,
    pub property_data: Bytes,
}

impl Service {
    /// object_type + object_id + property_id
    pub const FIXED_LEN: usize = 8;

    pub fn new(
        object_type: ObjectType,
        object_id: u32,
        property_id: PropertyId,
        property_data: impl Into<Bytes>,
    ) -> Self {
        Self {
            object_type,
            object_id,
            property_id,
            property_data: property_data.into(),
        }
    }

    pub fn encoded_len(&self) -> usize {
        Self::FIXED_LEN + self.property_data.len()
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u16_le(self.object_type.0);
        buf.put_u32_le(self.object_id);
        buf.put_u16_le(self.property_id.0);
        buf.put_slice(&self.property_data);
    }

    /// Decode a service; everything after the fixed fields is `property_data`
    pub fn decode(mut data: &[u8]) -> XcomResult<Self> {
        if data.len() < Self::FIXED_LEN {
            return Err(XcomError::malformed(format!(
                "service too short: {} bytes, need {}",
                data.len(),
                Self::FIXED_LEN
            )));
        }

        let object_type = ObjectType(data.get_u16_le());
        let object_id = data.get_u32_le();
        let property_id = PropertyId(data.get_u16_le());

        Ok(Self {
            object_type,
            object_id,
            property_id,
            property_data: Bytes::copy_from_slice(data),
        })
    }
}

// ============================================================================
// Frame
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub service_flags: u8,
    pub service_id: ServiceId,
    pub service: Service,
}

impl Frame {
    /// Request frame (no flags set)
    pub fn new(service_id: ServiceId, service: Service) -> Self {
        Self {
            service_flags: 0,
            service_id,
            service,
        }
    }

    pub fn with_flags(mut self, service_flags: u8) -> Self {
        self.service_flags = service_flags;
        self
    }

    pub fn encoded_len(&self) -> usize {
        2 + self.service.encoded_len()
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.service_flags);
        buf.put_u8(self.service_id.0);
        self.service.encode(buf);
    }

    pub fn decode(mut data: &[u8]) -> XcomResult<Self> {
        if data.len() < FRAME_FIXED_LEN {
            return Err(XcomError::malformed(format!(
                "frame too short: {} bytes, need {}",
                data.len(),
                FRAME_FIXED_LEN
            )));
        }

        let service_flags = data.get_u8();
        let service_id = ServiceId(data.get_u8());
        let service = Service::decode(data)?;

        Ok(Self {
            service_flags,
            service_id,
            service,
        })
    }
}

// ============================================================================
// Header
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub frame_flags: u8,
    pub src_addr: u32,
    pub dst_addr: u32,
    pub data_length: u16,
}

impl Header {
    pub fn new(src_addr: u32, dst_addr: u32, data_length: u16) -> Self {
        Self {
            frame_flags: 0,
            src_addr,
            dst_addr,
            data_length,
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.frame_flags);
        buf.put_u32_le(self.src_addr);
        buf.put_u32_le(self.dst_addr);
        buf.put_u16_le(self.data_length);
    }

    pub fn decode(mut data: &[u8]) -> XcomResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(XcomError::malformed(format!(
                "header too short: {} bytes, need {HEADER_LEN}",
                data.len()
            )));
        }

        Ok(Self {
            frame_flags: data.get_u8(),
            src_addr: data.get_u32_le(),
            dst_addr: data.get_u32_le(),
            data_length: data.get_u16_le(),
        })
    }
}

// ============================================================================
// Package
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub header: Header,
    pub frame: Frame,
}

impl Package {
    pub fn new(header: Header, frame: Frame) -> Self {
        Self { header, frame }
    }

    /// Request from the default source to the default destination
    ///
    /// `data_length` is derived from the frame. A frame longer than the 16-bit
    /// length field keeps `u16::MAX` here and is rejected by [`Package::assemble`].
    pub fn request(
        service_id: ServiceId,
        object_type: ObjectType,
        object_id: u32,
        property_id: PropertyId,
        payload: impl Into<Bytes>,
    ) -> Self {
        let frame = Frame::new(
            service_id,
            Service::new(object_type, object_id, property_id, payload),
        );
        let data_length = u16::try_from(frame.encoded_len()).unwrap_or(u16::MAX);
        Self {
            header: Header::new(DEFAULT_SRC_ADDR, DEFAULT_DST_ADDR, data_length),
            frame,
        }
    }

    pub fn with_addresses(mut self, src_addr: u32, dst_addr: u32) -> Self {
        self.header.src_addr = src_addr;
        self.header.dst_addr = dst_addr;
        self
    }

    /// Total length on the wire
    pub fn encoded_len(&self) -> usize {
        1 + HEADER_LEN + CHECKSUM_LEN + self.frame.encoded_len() + CHECKSUM_LEN
    }

    /// Serialize the package
    ///
    /// Fails when `header.data_length` differs from the encoded frame length
    /// or the frame does not fit the 16-bit length field.
    pub fn assemble(&self) -> XcomResult<Bytes> {
        let frame_len = self.frame.encoded_len();
        if frame_len > usize::from(u16::MAX) {
            return Err(XcomError::malformed(format!(
                "frame of {frame_len} bytes exceeds the 16-bit length field"
            )));
        }
        if usize::from(self.header.data_length) != frame_len {
            return Err(XcomError::malformed(format!(
                "header data_length {} does not match frame length {frame_len}",
                self.header.data_length
            )));
        }

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(START_BYTE);

        self.header.encode(&mut buf);
        let header_sum = checksum(&buf[1..]);
        buf.put_slice(&header_sum);

        let frame_start = buf.len();
        self.frame.encode(&mut buf);
        let frame_sum = checksum(&buf[frame_start..]);
        buf.put_slice(&frame_sum);

        Ok(buf.freeze())
    }

    /// Parse one package; bytes after the frame checksum are ignored
    pub fn parse(buf: &[u8]) -> XcomResult<Self> {
        Self::parse_prefix(buf).map(|(package, _)| package)
    }

    /// Parse the package at the start of `buf` and report how many bytes it used
    pub fn parse_prefix(buf: &[u8]) -> XcomResult<(Self, usize)> {
        let offset = start_offset(buf)?;

        let header_start = offset + 1;
        let header_end = header_start + HEADER_LEN;
        let header_raw = slice(buf, header_start, header_end, "header")?;
        let header_sum = slice(buf, header_end, header_end + CHECKSUM_LEN, "header checksum")?;
        if !verify(header_raw, header_sum) {
            return Err(XcomError::malformed(format!(
                "header checksum mismatch: computed {:02X?}, received {header_sum:02X?}",
                checksum(header_raw)
            )));
        }
        let header = Header::decode(header_raw)?;

        let frame_start = header_end + CHECKSUM_LEN;
        let frame_end = frame_start + usize::from(header.data_length);
        let frame_raw = slice(buf, frame_start, frame_end, "frame")?;
        let frame_sum = slice(buf, frame_end, frame_end + CHECKSUM_LEN, "frame checksum")?;
        if !verify(frame_raw, frame_sum) {
            return Err(XcomError::malformed(format!(
                "frame checksum mismatch: computed {:02X?}, received {frame_sum:02X?}",
                checksum(frame_raw)
            )));
        }
        let frame = Frame::decode(frame_raw)?;

        Ok((Self { header, frame }, frame_end + CHECKSUM_LEN))
    }

    /// service_flags bit 1
    pub fn is_response(&self) -> bool {
        self.frame.service_flags & FLAG_RESPONSE != 0
    }

    /// service_flags bit 0
    pub fn is_error(&self) -> bool {
        self.frame.service_flags & FLAG_ERROR != 0
    }

    /// Raw error code bytes of an error response
    pub fn error_payload(&self) -> Option<&[u8]> {
        self.is_error().then(|| &self.frame.service.property_data[..])
    }

    pub fn service(&self) -> &Service {
        &self.frame.service
    }

    pub fn payload(&self) -> &Bytes {
        &self.frame.service.property_data
    }

    /// Reply to this request as the device would send it: addresses swapped,
    /// response flag set, `payload` as property data
    pub fn response(&self, payload: impl Into<Bytes>) -> Package {
        self.reply_with(FLAG_RESPONSE, payload.into())
    }

    /// Error reply carrying `code` (LE) as property data
    pub fn error_response(&self, code: u16) -> Package {
        self.reply_with(
            FLAG_RESPONSE | FLAG_ERROR,
            Bytes::copy_from_slice(&code.to_le_bytes()),
        )
    }

    fn reply_with(&self, service_flags: u8, payload: Bytes) -> Package {
        let service = Service {
            property_data: payload,
            ..self.frame.service.clone()
        };
        let frame = Frame::new(self.frame.service_id, service).with_flags(service_flags);
        let data_length = u16::try_from(frame.encoded_len()).unwrap_or(u16::MAX);
        Package {
            header: Header {
                frame_flags: self.header.frame_flags,
                src_addr: self.header.dst_addr,
                dst_addr: self.header.src_addr,
                data_length,
            },
            frame,
        }
    }

    /// Whether `reply` answers this request
    pub fn correlates(&self, reply: &Package) -> bool {
        reply.is_response()
            && reply.frame.service_id == self.frame.service_id
            && reply.frame.service.object_id == self.frame.service.object_id
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let service = &self.frame.service;
        write!(
            f,
            "Package(src={}, dst={}, flags=0x{:02X}, service={}, object={}:{}, property={}, data={} bytes)",
            self.header.src_addr,
            self.header.dst_addr,
            self.frame.service_flags,
            self.frame.service_id,
            service.object_type,
            service.object_id,
            service.property_id,
            service.property_data.len()
        )
    }
}

/// Offset of the start byte, tolerating exactly one leading 0xFF
fn start_offset(buf: &[u8]) -> XcomResult<usize> {
    match buf {
        [] => Err(XcomError::malformed("empty buffer")),
        [START_BYTE, ..] => Ok(0),
        [STRAY_BYTE, START_BYTE, ..] => Ok(1),
        [STRAY_BYTE] => Err(XcomError::malformed("truncated after leading 0xFF")),
        [STRAY_BYTE, other, ..] => Err(XcomError::malformed(format!(
            "expected start byte 0xAA after 0xFF, got 0x{other:02X}"
        ))),
        [other, ..] => Err(XcomError::malformed(format!(
            "invalid start byte 0x{other:02X}"
        ))),
    }
}

fn slice<'a>(buf: &'a [u8], start: usize, end: usize, what: &str) -> XcomResult<&'a [u8]> {
    buf.get(start..end).ok_or_else(|| {
        XcomError::malformed(format!(
            "truncated {what}: need {end} bytes, have {}",
            buf.len()
        ))
    })
}

// ============================================================================
// Free functions
// ============================================================================

pub fn assemble(package: &Package) -> XcomResult<Bytes> {
    package.assemble()
}

pub fn parse(buf: &[u8]) -> XcomResult<Package> {
    Package::parse(buf)
}

pub fn parse_prefix(buf: &[u8]) -> XcomResult<(Package, usize)> {
    Package::parse_prefix(buf)
}

/// Bytes a complete package at the start of `buf` occupies
///
/// `None` while the header is not fully buffered. An invalid start byte yields
/// the length read so far, so the caller hands the buffer to [`parse`] and gets
/// the error.
pub fn complete_len(buf: &[u8]) -> Option<usize> {
    let offset = usize::from(*buf.first()? == STRAY_BYTE);
    if *buf.get(offset)? != START_BYTE {
        return Some(offset + 1);
    }

    let at = offset + 1 + DATA_LENGTH_OFFSET;
    let data_length = u16::from_le_bytes([*buf.get(at)?, *buf.get(at + 1)?]);
    Some(offset + 1 + HEADER_LEN + CHECKSUM_LEN + usize::from(data_length) + CHECKSUM_LEN)
}

/// Build a request package with explicit addresses
pub fn build_request(
    service_id: ServiceId,
    object_type: ObjectType,
    object_id: u32,
    property_id: PropertyId,
    payload: impl Into<Bytes>,
    src_addr: u32,
    dst_addr: u32,
) -> Package {
    Package::request(service_id, object_type, object_id, property_id, payload)
        .with_addresses(src_addr, dst_addr)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn read_request() -> Package {
        build_request(
            ServiceId::READ_PROPERTY,
            ObjectType::INFO,
            3000,
            PropertyId::VALUE,
            Bytes::new(),
            1,
            101,
        )
    }

    #[test]
    fn test_assemble_read_request_bytes() {
        let bytes = read_request().assemble().unwrap();
        let expected_header = [0x00, 0x01, 0x00, 0x00, 0x00, 0x65, 0x00, 0x00, 0x00, 0x0A, 0x00];
        let expected_frame = [0x00, 0x01, 0x01, 0x00, 0xB8, 0x0B, 0x00, 0x00, 0x05, 0x00];

        assert_eq!(bytes.len(), 1 + 11 + 2 + 10 + 2);
        assert_eq!(bytes[0], 0xAA);
        assert_eq!(&bytes[1..12], &expected_header);
        assert_eq!(&bytes[12..14], &checksum(&expected_header));
        assert_eq!(&bytes[14..24], &expected_frame);
        assert_eq!(&bytes[24..26], &checksum(&expected_frame));
    }

    #[test]
    fn test_build_request_computes_data_length() {
        let pkg = build_request(
            ServiceId::WRITE_PROPERTY,
            ObjectType::PARAMETER,
            1138,
            PropertyId::UNSAVED_VALUE,
            vec![0x00, 0x00, 0x48, 0x41],
            1,
            100,
        );
        assert_eq!(pkg.header.data_length, 14);
        assert_eq!(pkg.frame.service_flags, 0);
    }

    #[test]
    fn test_request_defaults() {
        let pkg = Package::request(
            ServiceId::READ_PROPERTY,
            ObjectType::PARAMETER,
            1107,
            PropertyId::UNSAVED_VALUE,
            Bytes::new(),
        );
        assert_eq!(pkg.header.src_addr, DEFAULT_SRC_ADDR);
        assert_eq!(pkg.header.dst_addr, DEFAULT_DST_ADDR);
    }

    #[test]
    fn test_assemble_rejects_length_mismatch() {
        let mut pkg = read_request();
        pkg.header.data_length = 11;
        let err = pkg.assemble().unwrap_err();
        assert!(matches!(err, XcomError::MalformedFrame(_)));
    }

    #[test]
    fn test_assemble_rejects_oversized_frame() {
        let pkg = Package::request(
            ServiceId::WRITE_PROPERTY,
            ObjectType::PARAMETER,
            1,
            PropertyId::VALUE,
            vec![0u8; 70_000],
        );
        assert!(pkg.assemble().is_err());
    }

    #[test]
    fn test_parse_ignores_trailing_bytes() {
        let pkg = read_request();
        let mut bytes = pkg.assemble().unwrap().to_vec();
        let len = bytes.len();
        bytes.extend_from_slice(&[0x0D, 0x0A, 0x99]);

        let (parsed, consumed) = Package::parse_prefix(&bytes).unwrap();
        assert_eq!(parsed, pkg);
        assert_eq!(consumed, len);
    }

    #[test]
    fn test_parse_rejects_short_frame() {
        // header declares a 4-byte frame, below the fixed 10 bytes
        let mut header = BytesMut::new();
        Header::new(1, 100, 4).encode(&mut header);
        let frame = [0x02, 0x01, 0x01, 0x00];

        let mut buf = vec![START_BYTE];
        buf.extend_from_slice(&header);
        buf.extend_from_slice(&checksum(&header));
        buf.extend_from_slice(&frame);
        buf.extend_from_slice(&checksum(&frame));

        let err = Package::parse(&buf).unwrap_err();
        assert!(err.to_string().contains("frame too short"));
    }

    #[test]
    fn test_parse_truncated() {
        let bytes = read_request().assemble().unwrap();
        for cut in [0, 1, 5, 13, 20, bytes.len() - 1] {
            assert!(
                matches!(Package::parse(&bytes[..cut]), Err(XcomError::MalformedFrame(_))),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn test_complete_len() {
        let bytes = read_request().assemble().unwrap();
        assert_eq!(complete_len(&bytes[..5]), None);
        assert_eq!(complete_len(&bytes[..12]), Some(bytes.len()));
        assert_eq!(complete_len(&bytes), Some(bytes.len()));

        let mut stray = vec![STRAY_BYTE];
        stray.extend_from_slice(&bytes);
        assert_eq!(complete_len(&stray), Some(bytes.len() + 1));

        assert_eq!(complete_len(&[0x42, 0x00]), Some(1));
        assert_eq!(complete_len(&[]), None);
    }

    #[test]
    fn test_flags_and_error_payload() {
        let mut pkg = read_request();
        assert!(!pkg.is_response());
        assert!(!pkg.is_error());
        assert!(pkg.error_payload().is_none());

        pkg.frame.service_flags = FLAG_RESPONSE | FLAG_ERROR;
        pkg.frame.service.property_data = Bytes::from_static(&[0x22, 0x00]);
        assert!(pkg.is_response());
        assert!(pkg.is_error());
        assert_eq!(pkg.error_payload(), Some(&[0x22u8, 0x00][..]));
    }

    #[test]
    fn test_correlates() {
        let request = read_request();
        let mut reply = request.clone();
        assert!(!request.correlates(&reply));

        reply.frame.service_flags = FLAG_RESPONSE;
        assert!(request.correlates(&reply));

        reply.frame.service.object_id = 3001;
        assert!(!request.correlates(&reply));
    }

    #[test]
    fn test_response_helpers() {
        let request = read_request();
        let reply = request.response(vec![0x00, 0x00, 0x66, 0x43]);
        assert!(request.correlates(&reply));
        assert!(!reply.is_error());
        assert_eq!(reply.header.src_addr, 101);
        assert_eq!(reply.header.dst_addr, 1);
        assert_eq!(reply.header.data_length, 14);
        assert!(reply.assemble().is_ok());

        let err = request.error_response(0x0022);
        assert!(err.is_error());
        assert_eq!(err.error_payload(), Some(&[0x22u8, 0x00][..]));
    }

    #[test]
    fn test_display() {
        let text = read_request().to_string();
        assert!(text.contains("READ_PROPERTY"));
        assert!(text.contains("INFO:3000"));
    }
}
