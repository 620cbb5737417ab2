//! TCP Server Transport Implementation
//!
//! For gateways configured to dial in: we listen, the gateway connects, and
//! requests and replies then share that one connection. A reply that does not
//! answer the request in flight (late answer to an earlier timed-out request)
//! is discarded and the request resent, a bounded number of times.

use async_trait::async_trait;
use bytes::BytesMut;
use errors::{XcomError, XcomResult};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use xcom_protocol::Package;

use super::io::{read_package, write_packet};
use super::traits::{Transport, TransportConfig, TransportStats};

/// TCP server transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpServerTransportConfig {
    /// Local bind address
    pub bind_addr: String,
    /// Local port the gateway connects to
    pub port: u16,
    /// Wait for the gateway to connect, in milliseconds
    pub accept_timeout_ms: u64,
    /// Exchange timeout in milliseconds
    pub timeout_ms: u64,
    /// Resends allowed after a non-matching reply
    pub max_resync_attempts: u32,
}

impl Default for TcpServerTransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 4001,
            accept_timeout_ms: 30_000,
            timeout_ms: 10_000,
            max_resync_attempts: 5,
        }
    }
}

impl TcpServerTransportConfig {
    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }
}

impl TransportConfig for TcpServerTransportConfig {
    fn name(&self) -> &str {
        "tcp_server"
    }

    fn validate(&self) -> XcomResult<()> {
        if self.bind_addr.is_empty() {
            return Err(XcomError::config("Bind address cannot be empty"));
        }

        if self.accept_timeout_ms == 0 || self.timeout_ms == 0 {
            return Err(XcomError::config("Timeouts must be greater than zero"));
        }

        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// TCP server transport implementation
#[derive(Debug)]
pub struct TcpServerTransport {
    config: TcpServerTransportConfig,
    name: String,
    listener: Option<TcpListener>,
    connection: Option<(TcpStream, SocketAddr)>,
    read_buf: BytesMut,
    stats: TransportStats,
}

impl TcpServerTransport {
    /// Bind the listening socket without waiting for the gateway
    pub async fn bind(config: TcpServerTransportConfig) -> XcomResult<Self> {
        config.validate()?;

        let addr = format!("{}:{}", config.bind_addr, config.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            error!("Failed to bind {addr}: {e}");
            XcomError::connection(&addr, e)
        })?;
        let local = listener.local_addr()?;
        info!("Waiting for Xcom gateway on {local}");

        Ok(Self {
            config,
            name: format!("tcp-server://{local}"),
            listener: Some(listener),
            connection: None,
            read_buf: BytesMut::with_capacity(512),
            stats: TransportStats::new(),
        })
    }

    /// Bind and wait for the gateway to connect, as at session start
    pub async fn listen(config: TcpServerTransportConfig) -> XcomResult<Self> {
        let mut transport = Self::bind(config).await?;
        transport.accept().await?;
        Ok(transport)
    }

    pub fn local_addr(&self) -> XcomResult<SocketAddr> {
        match &self.listener {
            Some(listener) => Ok(listener.local_addr()?),
            None => Err(XcomError::connection(&self.name, "listener closed")),
        }
    }

    /// Peer address of the connected gateway
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.connection.as_ref().map(|(_, peer)| *peer)
    }

    /// Wait for the gateway to connect, replacing any current connection
    pub async fn accept(&mut self) -> XcomResult<SocketAddr> {
        let Some(listener) = &self.listener else {
            return Err(XcomError::connection(&self.name, "listener closed"));
        };

        let (stream, peer) = match timeout(self.config.accept_timeout(), listener.accept()).await
        {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => {
                self.stats.record_failure();
                return Err(XcomError::Io(e));
            },
            Err(_) => {
                self.stats.record_timeout();
                return Err(XcomError::timeout(format!("{} (accept)", self.name)));
            },
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {peer}: {e}");
        }
        info!("Xcom gateway connected from {peer}");
        self.read_buf.clear();
        self.connection = Some((stream, peer));
        self.stats.record_connection();
        Ok(peer)
    }

    fn drop_connection(&mut self) {
        if let Some((_, peer)) = self.connection.take() {
            info!("Dropped gateway connection from {peer}");
            self.stats.record_disconnection();
        }
        self.read_buf.clear();
    }
}

/// Send `request` and read until a correlating reply arrives
async fn exchange_on(
    stream: &mut TcpStream,
    read_buf: &mut BytesMut,
    stats: &mut TransportStats,
    request: &Package,
    data: &[u8],
    max_resync: u32,
    peer: &str,
) -> XcomResult<Package> {
    let mut attempts = 0;
    loop {
        write_packet(stream, data, "TCP Transport").await?;
        stats.record_bytes_sent(data.len());

        let reply = read_package(stream, read_buf, peer).await?;
        stats.record_bytes_received(reply.encoded_len());
        if request.correlates(&reply) {
            return Ok(reply);
        }

        warn!(
            "Discarding reply that does not match request ({reply}), resync {}/{max_resync}",
            attempts + 1
        );
        stats.record_resync();
        attempts += 1;
        if attempts > max_resync {
            return Err(XcomError::UnexpectedResponse(format!(
                "no matching reply from {peer} after {max_resync} resends"
            )));
        }
        debug!("Resending request to {peer}");
    }
}

#[async_trait]
impl Transport for TcpServerTransport {
    fn transport_type(&self) -> &str {
        "tcp_server"
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn exchange(&mut self, request: &Package) -> XcomResult<Package> {
        let data = request.assemble()?;
        // reconnect after a dropped connection; a caller's budget may cut this short
        if self.connection.is_none() {
            self.accept().await?;
        }

        let budget = self.config.timeout();
        let max_resync = self.config.max_resync_attempts;
        let Some((stream, peer)) = self.connection.as_mut() else {
            return Err(XcomError::connection(&self.name, "gateway not connected"));
        };
        let peer = peer.to_string();

        let outcome = timeout(
            budget,
            exchange_on(
                stream,
                &mut self.read_buf,
                &mut self.stats,
                request,
                &data,
                max_resync,
                &peer,
            ),
        )
        .await;

        match outcome {
            Ok(Ok(reply)) => {
                self.stats.record_exchange();
                Ok(reply)
            },
            Ok(Err(e)) => {
                error!("Exchange with gateway {peer} failed: {e}");
                self.stats.record_failure();
                if matches!(
                    e,
                    XcomError::Io(_) | XcomError::ConnectionFailed { .. } | XcomError::EmptyResponse(_)
                ) {
                    self.drop_connection();
                }
                Err(e)
            },
            Err(_) => {
                warn!("Exchange with gateway {peer} timed out after {budget:?}");
                self.stats.record_timeout();
                Err(XcomError::timeout(peer))
            },
        }
    }

    fn stats(&self) -> TransportStats {
        self.stats.clone()
    }

    async fn close(&mut self) -> XcomResult<()> {
        self.drop_connection();
        if self.listener.take().is_some() {
            info!("Stopped listening on {}", self.name);
        }
        Ok(())
    }
}
