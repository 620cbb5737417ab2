//! Transport Factory
//!
//! Builds the configured transport behind a `Box<dyn Transport>` so the
//! session layer never depends on the link type.

use errors::{XcomError, XcomResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use super::serial::{SerialTransport, SerialTransportConfig};
use super::tcp_client::{TcpClientTransport, TcpClientTransportConfig};
use super::tcp_server::{TcpServerTransport, TcpServerTransportConfig};
use super::traits::{Transport, TransportConfig};
use super::udp::{UdpTransport, UdpTransportConfig};

/// Supported transport types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    /// Xcom-232i serial link
    Serial,
    /// Xcom-LAN over UDP
    Udp,
    /// Outbound TCP connection to the gateway
    TcpClient,
    /// Gateway dials in to our listener
    TcpServer,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportType::Serial => write!(f, "serial"),
            TransportType::Udp => write!(f, "udp"),
            TransportType::TcpClient => write!(f, "tcp_client"),
            TransportType::TcpServer => write!(f, "tcp_server"),
        }
    }
}

impl std::str::FromStr for TransportType {
    type Err = XcomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "serial" | "rs232" => Ok(TransportType::Serial),
            "udp" => Ok(TransportType::Udp),
            "tcp_client" | "tcp" => Ok(TransportType::TcpClient),
            "tcp_server" => Ok(TransportType::TcpServer),
            _ => Err(XcomError::config(format!("Unknown transport type: {s}"))),
        }
    }
}

/// Configuration for any supported transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportSettings {
    Serial(SerialTransportConfig),
    Udp(UdpTransportConfig),
    TcpClient(TcpClientTransportConfig),
    TcpServer(TcpServerTransportConfig),
}

impl Default for TransportSettings {
    fn default() -> Self {
        TransportSettings::Serial(SerialTransportConfig::default())
    }
}

impl TransportSettings {
    /// Get the transport type for this configuration
    pub fn transport_type(&self) -> TransportType {
        match self {
            TransportSettings::Serial(_) => TransportType::Serial,
            TransportSettings::Udp(_) => TransportType::Udp,
            TransportSettings::TcpClient(_) => TransportType::TcpClient,
            TransportSettings::TcpServer(_) => TransportType::TcpServer,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> XcomResult<()> {
        match self {
            TransportSettings::Serial(config) => config.validate(),
            TransportSettings::Udp(config) => config.validate(),
            TransportSettings::TcpClient(config) => config.validate(),
            TransportSettings::TcpServer(config) => config.validate(),
        }
    }
}

/// Transport factory
#[derive(Debug, Default, Clone, Copy)]
pub struct TransportFactory;

impl TransportFactory {
    /// Create a transport instance from configuration
    pub async fn create(settings: &TransportSettings) -> XcomResult<Box<dyn Transport>> {
        let transport_type = settings.transport_type();
        debug!("Creating transport of type: {transport_type}");

        settings.validate()?;

        let transport: Box<dyn Transport> = match settings {
            TransportSettings::Serial(config) => Box::new(SerialTransport::new(config.clone())?),
            TransportSettings::Udp(config) => Box::new(UdpTransport::bind(config.clone()).await?),
            TransportSettings::TcpClient(config) => {
                Box::new(TcpClientTransport::new(config.clone()).await?)
            },
            TransportSettings::TcpServer(config) => {
                Box::new(TcpServerTransport::listen(config.clone()).await?)
            },
        };

        info!("Created {transport_type} transport: {}", transport.name());
        Ok(transport)
    }

    /// Get list of supported transport types
    pub fn supported_transport_types() -> [TransportType; 4] {
        [
            TransportType::Serial,
            TransportType::Udp,
            TransportType::TcpClient,
            TransportType::TcpServer,
        ]
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_transport_type_parsing() {
        assert_eq!("serial".parse::<TransportType>().unwrap(), TransportType::Serial);
        assert_eq!("TCP-Server".parse::<TransportType>().unwrap(), TransportType::TcpServer);
        assert!("can".parse::<TransportType>().is_err());

        for t in TransportFactory::supported_transport_types() {
            assert_eq!(t.to_string().parse::<TransportType>().unwrap(), t);
        }
    }

    #[test]
    fn test_settings_tagged_by_kind() {
        let settings: TransportSettings =
            serde_json::from_str(r#"{"kind": "udp", "host": "192.168.1.20"}"#).unwrap();
        match &settings {
            TransportSettings::Udp(config) => {
                assert_eq!(config.host, "192.168.1.20");
                assert_eq!(config.listen_port, 4002);
            },
            other => panic!("unexpected settings: {other:?}"),
        }
        assert_eq!(settings.transport_type(), TransportType::Udp);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_config() {
        let settings = TransportSettings::TcpClient(TcpClientTransportConfig {
            host: String::new(),
            ..Default::default()
        });
        let err = TransportFactory::create(&settings).await.unwrap_err();
        assert!(matches!(err, XcomError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_create_tcp_server_waits_for_gateway() {
        let settings = TransportSettings::TcpServer(TcpServerTransportConfig {
            bind_addr: "127.0.0.1".to_string(),
            port: 0,
            accept_timeout_ms: 100,
            ..Default::default()
        });
        let err = TransportFactory::create(&settings).await.unwrap_err();
        assert!(matches!(err, XcomError::Timeout(ref name) if name.contains("accept")));
    }
}
