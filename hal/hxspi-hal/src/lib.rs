//! hxspi Hardware Abstraction Layer
//!
//! This crate defines the traits the touch controller core consumes from
//! its platform. A kernel-less host harness, a simulator or an embedded
//! board support package implements them; the core never touches a
//! register or a thread directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  hxspi-core (bus engine, dispatcher)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  hxspi-hal (this crate - traits)        │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  hxspi-host   │       │  board HALs   │
//! │ (threads/sim) │       │ (embedded-hal)│
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`spi::SpiBus`] - Full-duplex SPI transactions
//! - [`gpio::OutputPin`] - Reset and power-enable lines
//! - [`irq::IrqLine`] - Threaded interrupt registration and masking
//! - [`poll::PollScheduler`] - Timer plus single-thread work queue
//! - [`irq::DataReadyHandler`] - Entry point invoked by either dispatch path
//! - [`power::PowerSequencer`] - Power rail and reset sequencing

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod irq;
pub mod poll;
pub mod power;
pub mod spi;

// Re-export key traits at crate root for convenience
pub use gpio::OutputPin;
pub use irq::{DataReadyHandler, IrqLine, Trigger};
pub use poll::{PollScheduler, PollTiming};
pub use power::PowerSequencer;
pub use spi::{SpiBus, SpiDeviceAdapter};
