//! Board-agnostic core for Himax SPI touch controllers
//!
//! This crate contains the logic that does not depend on a particular
//! kernel or board:
//!
//! - Configuration types (bus limits, device-reported flags, poll timing)
//! - The shared transfer buffer and byte-exact frame encoding
//! - The bus transaction engine (framing, retry, mutual exclusion)
//! - The interrupt/polling dispatcher and its idempotent IRQ gate
//! - The device lifecycle (attach, dispatcher registration, teardown)
//!
//! Platform services (SPI, interrupt lines, timers, power rails) come in
//! through the traits in `hxspi-hal`.

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;
#[cfg(test)]
extern crate std;

mod fmt;

pub mod bus;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod lifecycle;

#[cfg(test)]
mod mock;

pub use bus::BusEngine;
pub use config::{BusConfig, DeviceConfig, DeviceInfo, PollConfig};
pub use dispatch::{DispatchMode, Dispatcher};
pub use error::{Error, LifecycleStage};
pub use lifecycle::Device;
