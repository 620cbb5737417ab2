//! Stream framing shared by the serial and TCP transports

use bytes::BytesMut;
use common::hex::format_hex_pretty;
use errors::{XcomError, XcomResult};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;
use xcom_protocol::{complete_len, Package, MSG_MAX_LENGTH, SERIAL_TERMINATOR};

/// Write all bytes and flush
pub(crate) async fn write_packet<W>(writer: &mut W, data: &[u8], tag: &str) -> XcomResult<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(data).await?;
    writer.flush().await?;
    debug!(hex_data = %format_hex_pretty(data), length = data.len(), direction = "send", "[{tag}] Raw packet");
    Ok(())
}

/// Whether `buf` ends with a terminator that closes a package
///
/// 0x0D 0x0A may occur inside the binary package, so the terminator only
/// counts once the package it follows is complete.
fn terminated(buf: &[u8]) -> bool {
    let Some(body) = buf.strip_suffix(&SERIAL_TERMINATOR) else {
        return false;
    };
    match complete_len(body) {
        Some(needed) => body.len() >= needed,
        None => body.is_empty(),
    }
}

/// Read a serial reply up to its terminator (stripped) or `MSG_MAX_LENGTH` bytes
pub(crate) async fn read_terminated<R>(reader: &mut R, endpoint: &str) -> XcomResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(MSG_MAX_LENGTH);
    let mut chunk = [0u8; 64];

    loop {
        let room = (MSG_MAX_LENGTH - buf.len()).min(chunk.len());
        let n = reader.read(&mut chunk[..room]).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if terminated(&buf) {
            buf.truncate(buf.len() - SERIAL_TERMINATOR.len());
            break;
        }
        if buf.len() >= MSG_MAX_LENGTH {
            break;
        }
    }

    debug!(hex_data = %format_hex_pretty(&buf), length = buf.len(), direction = "recv", "[Serial Transport] Raw packet");
    if buf.is_empty() {
        return Err(XcomError::EmptyResponse(endpoint.to_string()));
    }
    Ok(buf)
}

/// Read one package from a byte stream
///
/// Bytes after the package stay in `buf` for the next call. A malformed
/// package clears the buffer since the stream position is lost.
pub(crate) async fn read_package<R>(
    reader: &mut R,
    buf: &mut BytesMut,
    peer: &str,
) -> XcomResult<Package>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(needed) = complete_len(&buf[..]) {
            if needed > MSG_MAX_LENGTH {
                buf.clear();
                return Err(XcomError::malformed(format!(
                    "declared package length {needed} exceeds {MSG_MAX_LENGTH} bytes"
                )));
            }
            if buf.len() >= needed {
                return match Package::parse_prefix(&buf[..]) {
                    Ok((package, consumed)) => {
                        let raw = buf.split_to(consumed);
                        debug!(hex_data = %format_hex_pretty(&raw), length = consumed, direction = "recv", "[TCP Transport] Raw packet");
                        Ok(package)
                    },
                    Err(e) => {
                        buf.clear();
                        Err(e)
                    },
                };
            }
        }

        buf.reserve(MSG_MAX_LENGTH);
        let n = reader.read_buf(buf).await?;
        if n == 0 {
            if buf.is_empty() {
                return Err(XcomError::EmptyResponse(peer.to_string()));
            }
            buf.clear();
            return Err(XcomError::connection(peer, "connection closed mid-package"));
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use bytes::Bytes;
    use xcom_protocol::{build_request, ObjectType, PropertyId, ServiceId};

    fn request(object_id: u32) -> Package {
        build_request(
            ServiceId::READ_PROPERTY,
            ObjectType::INFO,
            object_id,
            PropertyId::VALUE,
            Bytes::new(),
            1,
            100,
        )
    }

    #[test]
    fn test_terminator_inside_package_is_payload() {
        // 0x0D 0x0A as float payload bytes
        let reply = request(3000).response(vec![0x0D, 0x0A, 0x0D, 0x0A]);
        let bytes = reply.assemble().unwrap();

        let payload_end = bytes.len() - 2;
        assert!(!terminated(&bytes[..payload_end]));

        let mut framed = bytes.to_vec();
        framed.extend_from_slice(&SERIAL_TERMINATOR);
        assert!(terminated(&framed));
        assert!(terminated(&SERIAL_TERMINATOR));
    }

    #[tokio::test]
    async fn test_read_terminated_strips_terminator() {
        let reply = request(3011).response(vec![0x00, 0x00, 0x66, 0x43]);
        let mut framed = reply.assemble().unwrap().to_vec();
        framed.extend_from_slice(&SERIAL_TERMINATOR);

        let (mut client, mut device) = tokio::io::duplex(512);
        device.write_all(&framed).await.unwrap();

        let body = read_terminated(&mut client, "test").await.unwrap();
        assert_eq!(Package::parse(&body).unwrap(), reply);
    }

    #[tokio::test]
    async fn test_read_terminated_empty() {
        let (mut client, mut device) = tokio::io::duplex(64);
        device.write_all(&SERIAL_TERMINATOR).await.unwrap();
        assert!(matches!(
            read_terminated(&mut client, "test").await,
            Err(XcomError::EmptyResponse(_))
        ));

        let (mut client, device) = tokio::io::duplex(64);
        drop(device);
        assert!(matches!(
            read_terminated(&mut client, "test").await,
            Err(XcomError::EmptyResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_read_package_keeps_following_bytes() {
        let first = request(1).response(vec![0x01]);
        let second = request(2).response(vec![0x02]);
        let mut stream = first.assemble().unwrap().to_vec();
        stream.extend_from_slice(&second.assemble().unwrap());

        let (mut client, mut device) = tokio::io::duplex(512);
        device.write_all(&stream).await.unwrap();

        let mut buf = BytesMut::new();
        assert_eq!(read_package(&mut client, &mut buf, "peer").await.unwrap(), first);
        assert_eq!(read_package(&mut client, &mut buf, "peer").await.unwrap(), second);
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_read_package_garbage_clears_buffer() {
        let (mut client, mut device) = tokio::io::duplex(64);
        device.write_all(&[0x42, 0x43, 0x44]).await.unwrap();

        let mut buf = BytesMut::new();
        let err = read_package(&mut client, &mut buf, "peer").await.unwrap_err();
        assert!(matches!(err, XcomError::MalformedFrame(_)));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_read_package_closed_mid_package() {
        let bytes = request(5).response(vec![0x05]).assemble().unwrap();
        let (mut client, mut device) = tokio::io::duplex(64);
        device.write_all(&bytes[..8]).await.unwrap();
        drop(device);

        let mut buf = BytesMut::new();
        let err = read_package(&mut client, &mut buf, "peer").await.unwrap_err();
        assert!(matches!(err, XcomError::ConnectionFailed { .. }));
    }
}
