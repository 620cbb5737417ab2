//! Xcom parameter model
//!
//! Metadata for the parameters a Studer Xcom gateway exposes:
//! - [`Datapoint`]: id, name, declared type, unit and writability
//! - [`ValueTuple`]: labelled values of enumerated parameters
//! - [`Dataset`]: the immutable parameter table consulted by identifier

pub mod datapoint;
pub mod dataset;
pub mod enums;

pub use datapoint::{is_info_id, DataType, Datapoint, ValueTuple};
pub use dataset::{Dataset, PointInfo};
pub use enums::{BATTERY_CYCLE_PHASES, MODE_CHARGING, OPERATING_MODES};
