//! Transport Layer Traits
//!
//! A transport owns one physical link to a device and performs one
//! request/response exchange at a time. Framing quirks (serial terminator,
//! UDP reply port, TCP resynchronization) stay inside each implementation.

use async_trait::async_trait;
use errors::XcomResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime};
use xcom_protocol::Package;

/// Connection state for transports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No link open yet, or closed
    Disconnected,
    /// Link open and ready
    Connected,
    /// Last operation failed at the link level
    Error,
}

/// Transport statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportStats {
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Total bytes received
    pub bytes_received: u64,
    /// Completed request/response exchanges
    pub exchanges: u64,
    /// Exchanges that ended in an error other than a timeout
    pub failed_exchanges: u64,
    /// Exchanges that ran out of time
    pub timeouts: u64,
    /// Uncorrelated frames discarded
    pub resyncs: u64,
    /// Links opened (ports, sockets, accepted connections)
    pub connections: u64,
    /// Last successful exchange
    pub last_exchange: Option<SystemTime>,
    /// Current connection state
    pub connection_state: ConnectionState,
}

impl TransportStats {
    pub fn new() -> Self {
        Self {
            bytes_sent: 0,
            bytes_received: 0,
            exchanges: 0,
            failed_exchanges: 0,
            timeouts: 0,
            resyncs: 0,
            connections: 0,
            last_exchange: None,
            connection_state: ConnectionState::Disconnected,
        }
    }

    pub fn record_connection(&mut self) {
        self.connections += 1;
        self.connection_state = ConnectionState::Connected;
    }

    pub fn record_disconnection(&mut self) {
        self.connection_state = ConnectionState::Disconnected;
    }

    pub fn record_bytes_sent(&mut self, bytes: usize) {
        self.bytes_sent += bytes as u64;
    }

    pub fn record_bytes_received(&mut self, bytes: usize) {
        self.bytes_received += bytes as u64;
    }

    pub fn record_exchange(&mut self) {
        self.exchanges += 1;
        self.last_exchange = Some(SystemTime::now());
    }

    pub fn record_failure(&mut self) {
        self.failed_exchanges += 1;
        self.connection_state = ConnectionState::Error;
    }

    pub fn record_timeout(&mut self) {
        self.timeouts += 1;
    }

    pub fn record_resync(&mut self) {
        self.resyncs += 1;
    }
}

impl Default for TransportStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Transport configuration trait
pub trait TransportConfig: Send + Sync + fmt::Debug + Clone {
    /// Get configuration name/identifier
    fn name(&self) -> &str;

    /// Validate configuration parameters
    fn validate(&self) -> XcomResult<()>;

    /// Wall-clock budget of one exchange
    fn timeout(&self) -> Duration;
}

/// Core transport trait defining the interface for all transport implementations
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Get transport type identifier
    fn transport_type(&self) -> &str;

    /// Get human-readable transport name (includes the endpoint)
    fn name(&self) -> &str;

    /// Send `request` and wait for the reply package
    ///
    /// Exactly one request is in flight. Fails with `Timeout` when no reply
    /// arrives within the transport's budget.
    async fn exchange(&mut self, request: &Package) -> XcomResult<Package>;

    /// Get transport statistics
    fn stats(&self) -> TransportStats;

    /// Release sockets, ports and connections held by the transport
    async fn close(&mut self) -> XcomResult<()>;

    /// Get transport-specific diagnostic information
    fn diagnostics(&self) -> HashMap<String, String> {
        let stats = self.stats();
        let mut diag = HashMap::new();
        diag.insert(
            "transport_type".to_string(),
            self.transport_type().to_string(),
        );
        diag.insert("name".to_string(), self.name().to_string());
        diag.insert(
            "connection_state".to_string(),
            format!("{:?}", stats.connection_state),
        );
        diag.insert("exchanges".to_string(), stats.exchanges.to_string());
        diag.insert("timeouts".to_string(), stats.timeouts.to_string());
        diag.insert("resyncs".to_string(), stats.resyncs.to_string());
        diag
    }
}

/// Implementation of Transport trait for Box<dyn Transport>
/// This allows Box<dyn Transport> to be used where Transport trait is required
#[async_trait]
impl Transport for Box<dyn Transport> {
    fn transport_type(&self) -> &str {
        self.as_ref().transport_type()
    }

    fn name(&self) -> &str {
        self.as_ref().name()
    }

    async fn exchange(&mut self, request: &Package) -> XcomResult<Package> {
        self.as_mut().exchange(request).await
    }

    fn stats(&self) -> TransportStats {
        self.as_ref().stats()
    }

    async fn close(&mut self) -> XcomResult<()> {
        self.as_mut().close().await
    }

    fn diagnostics(&self) -> HashMap<String, String> {
        self.as_ref().diagnostics()
    }
}
