//! Transport Layer Module
//!
//! One transport per physical link. The session layer only sees
//! [`Transport::exchange`]; everything link specific stays below it.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │               XcomClient (session layer)                 │
//! └──────────────────────────────────────────────────────────┘
//!                             │ exchange(&Package)
//!                             ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │               Transport Interface (Trait)                │
//! └──────────────────────────────────────────────────────────┘
//!       │               │               │               │
//!       ▼               ▼               ▼               ▼
//! ┌──────────┐   ┌──────────┐   ┌────────────┐   ┌────────────┐
//! │  Serial  │   │   UDP    │   │ TCP client │   │ TCP server │
//! │ (CR LF)  │   │ (4001 →  │   │            │   │  (resync)  │
//! │          │   │  ← 4002) │   │            │   │            │
//! └──────────┘   └──────────┘   └────────────┘   └────────────┘
//! ```

pub mod factory;
pub(crate) mod io;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod serial;
pub mod tcp_client;
pub mod tcp_server;
pub mod traits;
pub mod udp;

pub use factory::{TransportFactory, TransportSettings, TransportType};
#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockTransport;
pub use serial::{SerialIo, SerialTransport, SerialTransportConfig};
pub use tcp_client::{ReplyPath, TcpClientTransport, TcpClientTransportConfig};
pub use tcp_server::{TcpServerTransport, TcpServerTransportConfig};
pub use traits::{ConnectionState, Transport, TransportConfig, TransportStats};
pub use udp::{UdpTransport, UdpTransportConfig};
