//! Serial Transport Implementation
//!
//! Xcom-232i link: every package is followed by 0x0D 0x0A and the reply is
//! read up to the same terminator. The port is opened on the first exchange
//! and kept open; an I/O error or timeout drops it so the next exchange
//! reopens a clean link.

use async_trait::async_trait;
use bytes::BufMut;
use errors::{XcomError, XcomResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, error, info, warn};
use xcom_protocol::{Package, SERIAL_TERMINATOR};

use super::io::{read_terminated, write_packet};
use super::traits::{Transport, TransportConfig, TransportStats};

/// Serial port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialTransportConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0", "COM1")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5, 6, 7, 8)
    pub data_bits: u8,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
    /// Parity ("None", "Even", "Odd")
    pub parity: String,
    /// Exchange timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SerialTransportConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            data_bits: 8,
            stop_bits: 1,
            parity: "None".to_string(),
            timeout_ms: 2000,
        }
    }
}

impl TransportConfig for SerialTransportConfig {
    fn name(&self) -> &str {
        "serial"
    }

    fn validate(&self) -> XcomResult<()> {
        if self.port.is_empty() {
            return Err(XcomError::config("Port path cannot be empty"));
        }

        if self.baud_rate == 0 {
            return Err(XcomError::config("Baud rate must be greater than zero"));
        }

        if ![5, 6, 7, 8].contains(&self.data_bits) {
            return Err(XcomError::config("Data bits must be 5, 6, 7, or 8"));
        }

        if ![1, 2].contains(&self.stop_bits) {
            return Err(XcomError::config("Stop bits must be 1 or 2"));
        }

        if !["None", "Even", "Odd"].contains(&self.parity.as_str()) {
            return Err(XcomError::config("Parity must be None, Even, or Odd"));
        }

        if self.timeout_ms == 0 {
            return Err(XcomError::config("Timeout must be greater than zero"));
        }

        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Byte stream the serial transport talks over
pub trait SerialIo: AsyncRead + AsyncWrite + Unpin + Send + Sync + fmt::Debug {}

impl<T> SerialIo for T where T: AsyncRead + AsyncWrite + Unpin + Send + Sync + fmt::Debug {}

/// Serial transport implementation
#[derive(Debug)]
pub struct SerialTransport {
    config: SerialTransportConfig,
    name: String,
    port: Option<Box<dyn SerialIo>>,
    /// Whether the stream was supplied by the caller and cannot be reopened
    injected: bool,
    stats: TransportStats,
}

impl SerialTransport {
    /// Create new serial transport; the port opens on the first exchange
    pub fn new(config: SerialTransportConfig) -> XcomResult<Self> {
        config.validate()?;

        Ok(Self {
            name: format!("serial://{}", config.port),
            config,
            port: None,
            injected: false,
            stats: TransportStats::new(),
        })
    }

    /// Transport over an already open stream (virtual ports, test doubles)
    pub fn with_stream(
        config: SerialTransportConfig,
        stream: impl SerialIo + 'static,
    ) -> XcomResult<Self> {
        let mut transport = Self::new(config)?;
        transport.port = Some(Box::new(stream));
        transport.injected = true;
        transport.stats.record_connection();
        Ok(transport)
    }

    fn parse_parity(&self) -> tokio_serial::Parity {
        match self.config.parity.as_str() {
            "Even" => tokio_serial::Parity::Even,
            "Odd" => tokio_serial::Parity::Odd,
            _ => tokio_serial::Parity::None,
        }
    }

    fn parse_data_bits(&self) -> tokio_serial::DataBits {
        match self.config.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        }
    }

    fn parse_stop_bits(&self) -> tokio_serial::StopBits {
        match self.config.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        }
    }

    fn ensure_open(&mut self) -> XcomResult<()> {
        if self.port.is_some() {
            return Ok(());
        }
        if self.injected {
            return Err(XcomError::connection(&self.name, "stream closed"));
        }

        debug!("Opening serial port: {}", self.config.port);
        let port = tokio_serial::new(&self.config.port, self.config.baud_rate)
            .data_bits(self.parse_data_bits())
            .parity(self.parse_parity())
            .stop_bits(self.parse_stop_bits())
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(self.config.timeout())
            .open_native_async()
            .map_err(|e| {
                error!("Failed to open serial port {}: {e}", self.config.port);
                self.stats.record_failure();
                XcomError::connection(&self.name, e)
            })?;

        #[cfg(unix)]
        let port = {
            let mut port = port;
            port.set_exclusive(true)
                .map_err(|e| XcomError::connection(&self.name, e))?;
            port
        };

        info!(
            "Opened serial port {} at {} baud",
            self.config.port, self.config.baud_rate
        );
        self.stats.record_connection();
        self.port = Some(Box::new(port));
        Ok(())
    }

    fn drop_port(&mut self) {
        if self.port.take().is_some() {
            self.stats.record_disconnection();
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn transport_type(&self) -> &str {
        "serial"
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn exchange(&mut self, request: &Package) -> XcomResult<Package> {
        let packet = request.assemble()?;
        let mut framed = Vec::with_capacity(packet.len() + SERIAL_TERMINATOR.len());
        framed.put_slice(&packet);
        framed.put_slice(&SERIAL_TERMINATOR);

        self.ensure_open()?;
        let budget = self.config.timeout();
        let name = &self.name;
        let Some(port) = self.port.as_mut() else {
            return Err(XcomError::connection(name, "serial port not open"));
        };

        let outcome = timeout(budget, async {
            write_packet(port, &framed, "Serial Transport").await?;
            read_terminated(port, name).await
        })
        .await;

        match outcome {
            Ok(Ok(body)) => {
                self.stats.record_bytes_sent(framed.len());
                self.stats.record_bytes_received(body.len());
                let reply = Package::parse(&body);
                match &reply {
                    Ok(_) => self.stats.record_exchange(),
                    Err(e) => {
                        warn!("Discarding unreadable serial reply: {e}");
                        self.stats.record_failure();
                    },
                }
                reply
            },
            Ok(Err(e)) => {
                error!("Serial exchange on {} failed: {e}", self.config.port);
                self.stats.record_failure();
                if matches!(e, XcomError::Io(_)) {
                    self.drop_port();
                }
                Err(e)
            },
            Err(_) => {
                warn!(
                    "Serial exchange on {} timed out after {:?}",
                    self.config.port, budget
                );
                self.stats.record_timeout();
                // late bytes would corrupt the next reply
                if !self.injected {
                    self.drop_port();
                }
                Err(XcomError::timeout(self.name.clone()))
            },
        }
    }

    fn stats(&self) -> TransportStats {
        self.stats.clone()
    }

    async fn close(&mut self) -> XcomResult<()> {
        if self.port.is_some() {
            info!("Closed serial port: {}", self.config.port);
        }
        self.drop_port();
        Ok(())
    }
}
