//! Studer Xcom client
//!
//! Typed parameter access to Studer Xtender/VarioTrack/VarioString devices
//! through an Xcom-232i (serial) or Xcom-LAN (UDP/TCP) gateway.
//!
//! ```no_run
//! # async fn run() -> errors::XcomResult<()> {
//! use xcom::{TransportFactory, XcomClient, XcomConfig};
//!
//! let config = XcomConfig::load(None)?;
//! let transport = TransportFactory::create(&config.transport).await?;
//! let client = XcomClient::new(transport, config.session.clone());
//! let voltage = client.read_by_id(3011).await?;
//! println!("AC input: {voltage} V");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod transport;

pub use client::XcomClient;
pub use config::{SessionConfig, XcomConfig};
pub use transport::{Transport, TransportFactory, TransportSettings, TransportStats};
