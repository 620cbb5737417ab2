//! Shared utilities for the Xcom crates
//!
//! - `hex`: hex formatting for raw packet logs
//! - `logging`: tracing subscriber setup

pub mod hex;
pub mod logging;

pub use logging::{init_logging, LoggingConfig};
