//! TCP Client Transport Implementation
//!
//! Connects out to an Xcom-LAN gateway. Depending on the gateway setup the
//! reply either comes back on the same connection or on a separate inbound
//! connection the gateway opens to a local listener.

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

/// Where the gateway delivers replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyPath {
    /// Reply on the outbound connection
    #[default]
    SameConnection,
    /// Reply on a connection the gateway opens to our listener
    Listener,
}

/// TCP client transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpClientTransportConfig {
    /// Gateway host name or IP
    pub host: String,
    /// Gateway port
    pub port: u16,
    pub reply_path: ReplyPath,
    /// Listener address, used with `ReplyPath::Listener`
    pub listen_addr: String,
    pub listen_port: u16,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Exchange timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for TcpClientTransportConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4001,
            reply_path: ReplyPath::SameConnection,
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 4002,
            connect_timeout_ms: 5000,
            timeout_ms: 10_000,
        }
    }
}

impl TcpClientTransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl TransportConfig for TcpClientTransportConfig {
    fn name(&self) -> &str {
        "tcp_client"
    }

    fn validate(&self) -> XcomResult<()> {
        if self.host.is_empty() {
            return Err(XcomError::config("Host cannot be empty"));
        }

        if self.port == 0 {
            return Err(XcomError::config("Port must be greater than zero"));
        }

        if self.connect_timeout_ms == 0 || self.timeout_ms == 0 {
            return Err(XcomError::config("Timeouts must be greater than zero"));
        }

        if self.reply_path == ReplyPath::Listener && self.listen_addr.is_empty() {
            return Err(XcomError::config(
                "Listen address is required when replies arrive on a listener",
            ));
        }

        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// TCP client transport implementation
#[derive(Debug)]
pub struct TcpClientTransport {
    config: TcpClientTransportConfig,
    name: String,
    stream: Option<TcpStream>,
    read_buf: BytesMut,
    listener: Option<TcpListener>,
    stats: TransportStats,
}

impl TcpClientTransport {
    /// Create the transport; binds the reply listener when configured
    pub async fn new(config: TcpClientTransportConfig) -> XcomResult<Self> {
        config.validate()?;

        let listener = match config.reply_path {
            ReplyPath::SameConnection => None,
            ReplyPath::Listener => {
                let listen = format!("{}:{}", config.listen_addr, config.listen_port);
                let listener = TcpListener::bind(&listen)
                    .await
                    .map_err(|e| XcomError::connection(&listen, e))?;
                info!("Listening for gateway replies on {}", listener.local_addr()?);
                Some(listener)
            },
        };

        Ok(Self {
            name: format!("tcp://{}", config.endpoint()),
            config,
            stream: None,
            read_buf: BytesMut::with_capacity(512),
            listener,
            stats: TransportStats::new(),
        })
    }

    /// Address of the reply listener, if one is bound
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    async fn connect(&mut self) -> XcomResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let endpoint = self.config.endpoint();
        debug!("Connecting to {endpoint}");
        match timeout(self.config.connect_timeout(), TcpStream::connect(&endpoint)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("Failed to set TCP_NODELAY on {endpoint}: {e}");
                }
                info!("Connected to {endpoint}");
                self.stats.record_connection();
                self.stream = Some(stream);
                Ok(())
            },
            Ok(Err(e)) => {
                error!("Failed to connect to {endpoint}: {e}");
                self.stats.record_failure();
                Err(XcomError::connection(endpoint, e))
            },
            Err(_) => {
                error!("Connection to {endpoint} timed out");
                self.stats.record_timeout();
                Err(XcomError::connection(endpoint, "connect timed out"))
            },
        }
    }

    fn drop_connection(&mut self) {
        if self.stream.take().is_some() {
            self.stats.record_disconnection();
        }
        self.read_buf.clear();
    }

    async fn send_and_receive(&mut self, request: &Package, data: &[u8]) -> XcomResult<Package> {
        let name = &self.name;
        let Some(stream) = self.stream.as_mut() else {
            return Err(XcomError::connection(name, "not connected"));
        };
        write_packet(stream, data, "TCP Transport").await?;

        let Some(listener) = &self.listener else {
            return read_package(stream, &mut self.read_buf, name).await;
        };

        // a reply connection left over from an earlier exchange is dropped
        loop {
            let (mut inbound, peer) = listener.accept().await?;
            debug!("Gateway reply connection from {peer}");
            let mut buf = BytesMut::with_capacity(512);
            let reply = read_package(&mut inbound, &mut buf, &peer.to_string()).await?;
            if request.correlates(&reply) {
                return Ok(reply);
            }
            warn!("Discarding reply connection from {peer} that does not answer the request: {reply}");
            self.stats.record_resync();
        }
    }
}

#[async_trait]
impl Transport for TcpClientTransport {
    fn transport_type(&self) -> &str {
        "tcp_client"
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn exchange(&mut self, request: &Package) -> XcomResult<Package> {
        let data = request.assemble()?;
        self.connect().await?;

        let budget = self.config.timeout();
        match timeout(budget, self.send_and_receive(request, &data)).await {
            Ok(Ok(reply)) => {
                self.stats.record_bytes_sent(data.len());
                self.stats.record_bytes_received(reply.encoded_len());
                self.stats.record_exchange();
                Ok(reply)
            },
            Ok(Err(e)) => {
                error!("TCP exchange with {} failed: {e}", self.name);
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
                warn!("TCP exchange with {} timed out after {budget:?}", self.name);
                self.stats.record_timeout();
                self.drop_connection();
                Err(XcomError::timeout(self.name.clone()))
            },
        }
    }

    fn stats(&self) -> TransportStats {
        self.stats.clone()
    }

    async fn close(&mut self) -> XcomResult<()> {
        if self.stream.is_some() {
            info!("Closed connection to {}", self.config.endpoint());
        }
        self.drop_connection();
        Ok(())
    }
}
