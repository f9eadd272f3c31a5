//! Configuration types
//!
//! Defines the bus limits, the device-reported record and the polling
//! timer parameters the core is built from.

mod types;

pub use types::*;
