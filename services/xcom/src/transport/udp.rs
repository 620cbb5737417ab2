//! UDP Transport Implementation
//!
//! The Xcom-LAN gateway does not answer to the datagram's source endpoint. It
//! sends every reply to a fixed port (4002 by default) on the client host. The
//! transport therefore binds a listener on that port for its whole lifetime,
//! starts the receive before the request goes out from an ephemeral socket,
//! and joins both under one overall budget. Datagrams that do not answer the
//! request in flight are dropped.

use async_trait::async_trait;
use common::hex::format_hex_pretty;
use errors::{XcomError, XcomResult};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{lookup_host, UdpSocket};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, warn};
use xcom_protocol::{Package, MSG_MAX_LENGTH};

use super::traits::{Transport, TransportConfig, TransportStats};

/// UDP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpTransportConfig {
    /// Gateway host name or IP
    pub host: String,
    /// Port requests are sent to
    pub device_port: u16,
    /// Local address the reply listener binds to
    pub listen_addr: String,
    /// Port the gateway sends replies to
    pub listen_port: u16,
    /// Wait for the reply datagram, in milliseconds
    pub receive_timeout_ms: u64,
    /// Overall exchange budget, in milliseconds
    pub timeout_ms: u64,
}

impl Default for UdpTransportConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            device_port: 4001,
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 4002,
            receive_timeout_ms: 2000,
            timeout_ms: 10_000,
        }
    }
}

impl UdpTransportConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

impl TransportConfig for UdpTransportConfig {
    fn name(&self) -> &str {
        "udp"
    }

    fn validate(&self) -> XcomResult<()> {
        if self.host.is_empty() {
            return Err(XcomError::config("Host cannot be empty"));
        }

        if self.device_port == 0 {
            return Err(XcomError::config("Device port must be greater than zero"));
        }

        if self.receive_timeout_ms == 0 || self.timeout_ms == 0 {
            return Err(XcomError::config("Timeouts must be greater than zero"));
        }

        if self.receive_timeout_ms > self.timeout_ms {
            return Err(XcomError::config(
                "Receive timeout cannot exceed the exchange timeout",
            ));
        }

        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// UDP transport implementation
#[derive(Debug)]
pub struct UdpTransport {
    config: UdpTransportConfig,
    name: String,
    device: SocketAddr,
    listener: Option<Arc<UdpSocket>>,
    stats: TransportStats,
}

impl UdpTransport {
    /// Resolve the gateway and bind the reply listener
    pub async fn bind(config: UdpTransportConfig) -> XcomResult<Self> {
        config.validate()?;

        let target = format!("{}:{}", config.host, config.device_port);
        let device = lookup_host(&target)
            .await
            .map_err(|e| XcomError::connection(&target, e))?
            .next()
            .ok_or_else(|| XcomError::connection(&target, "host did not resolve"))?;

        let listen = format!("{}:{}", config.listen_addr, config.listen_port);
        let listener = UdpSocket::bind(&listen).await.map_err(|e| {
            error!("Failed to bind UDP reply listener on {listen}: {e}");
            XcomError::connection(&listen, e)
        })?;
        info!(
            "UDP transport for {device} listening for replies on {}",
            listener.local_addr()?
        );

        let mut stats = TransportStats::new();
        stats.record_connection();

        Ok(Self {
            config,
            name: format!("udp://{device}"),
            device,
            listener: Some(Arc::new(listener)),
            stats,
        })
    }

    /// Address the reply listener is bound to
    pub fn listen_addr(&self) -> XcomResult<SocketAddr> {
        Ok(self.listener()?.local_addr()?)
    }

    pub fn device_addr(&self) -> SocketAddr {
        self.device
    }

    fn listener(&self) -> XcomResult<&Arc<UdpSocket>> {
        self.listener
            .as_ref()
            .ok_or_else(|| XcomError::connection(&self.name, "transport closed"))
    }

    async fn send_request(&self, data: &[u8]) -> XcomResult<()> {
        let local: SocketAddr = if self.device.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let sender = UdpSocket::bind(local).await?;
        let sent = sender.send_to(data, self.device).await?;
        debug!(hex_data = %format_hex_pretty(data), length = sent, direction = "send", "[UDP Transport] Raw packet");
        Ok(())
    }
}

/// Reply picked off the listener, with what was read on the way
struct Received {
    reply: Package,
    bytes: usize,
    discarded: u64,
}

/// Aborts the receive task when the exchange is dropped before it completes
struct ReceiveTask(JoinHandle<XcomResult<Received>>);

impl Drop for ReceiveTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Read datagrams until one answers `request`
///
/// The listener outlives each exchange, so a late reply to an earlier request
/// can still be queued. Such datagrams are logged and dropped.
async fn receive_reply(
    listener: Arc<UdpSocket>,
    request: Package,
    wait: Duration,
    endpoint: String,
) -> XcomResult<Received> {
    let deadline = Instant::now() + wait;
    let mut buf = vec![0u8; MSG_MAX_LENGTH];
    let mut bytes = 0;
    let mut discarded = 0;

    loop {
        let (n, from) = match timeout_at(deadline, listener.recv_from(&mut buf)).await {
            Ok(Ok(received)) => received,
            Ok(Err(e)) => return Err(XcomError::Io(e)),
            Err(_) => {
                error!("Waiting for response from {endpoint} timed out");
                return Err(XcomError::timeout(endpoint));
            },
        };
        let datagram = &buf[..n];
        debug!(hex_data = %format_hex_pretty(datagram), length = n, %from, direction = "recv", "[UDP Transport] Raw packet");
        bytes += n;

        if datagram.is_empty() {
            warn!("Empty datagram from {from}");
            return Err(XcomError::EmptyResponse(endpoint));
        }

        let reply = Package::parse(datagram)?;
        if request.correlates(&reply) {
            return Ok(Received {
                reply,
                bytes,
                discarded,
            });
        }
        warn!("Discarding datagram from {from} that does not answer the request: {reply}");
        discarded += 1;
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn transport_type(&self) -> &str {
        "udp"
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn exchange(&mut self, request: &Package) -> XcomResult<Package> {
        let data = request.assemble()?;
        let listener = Arc::clone(self.listener()?);

        // listen before sending so a fast reply is not lost
        let mut receiver = ReceiveTask(tokio::spawn(receive_reply(
            listener,
            request.clone(),
            self.config.receive_timeout(),
            self.name.clone(),
        )));

        if let Err(e) = self.send_request(&data).await {
            error!("Failed to send UDP request to {}: {e}", self.device);
            self.stats.record_failure();
            return Err(e);
        }
        self.stats.record_bytes_sent(data.len());

        let received = match timeout(self.config.timeout(), &mut receiver.0).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(XcomError::Io(std::io::Error::other(join_error))),
            Err(_) => Err(XcomError::timeout(self.name.clone())),
        };

        match received {
            Ok(Received {
                reply,
                bytes,
                discarded,
            }) => {
                self.stats.record_bytes_received(bytes);
                for _ in 0..discarded {
                    self.stats.record_resync();
                }
                self.stats.record_exchange();
                Ok(reply)
            },
            Err(e) => {
                if matches!(e, XcomError::Timeout(_)) {
                    self.stats.record_timeout();
                } else {
                    self.stats.record_failure();
                }
                Err(e)
            },
        }
    }

    fn stats(&self) -> TransportStats {
        self.stats.clone()
    }

    async fn close(&mut self) -> XcomResult<()> {
        if self.listener.take().is_some() {
            info!("Closed UDP reply listener for {}", self.device);
            self.stats.record_disconnection();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        let config = UdpTransportConfig::default();
        assert_eq!(config.device_port, 4001);
        assert_eq!(config.listen_port, 4002);
        assert_eq!(config.receive_timeout(), Duration::from_secs(2));
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = UdpTransportConfig {
            receive_timeout_ms: 20_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = UdpTransportConfig {
            host: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
