//! Host runtime for the hxspi core
//!
//! Implements the platform traits with std threads so the core can run in
//! simulators and test harnesses:
//!
//! - [`irq::ThreadedIrq`]: interrupt line serviced by a dedicated thread
//! - [`poll::WorkQueuePoller`]: fixed-period timer feeding a one-thread
//!   work queue
//! - [`power::GpioPowerSequencer`]: reset and 3V3 rail sequencing
//! - [`display::DisplayNotifier`]: blank events to suspend/resume
//! - [`sim::SimulatedTouchIc`]: protocol-level controller model
//! - [`config`]: TOML/postcard configuration loading
//! - [`sync::StdRawMutex`]: one independent lock per blocking mutex

pub mod config;
pub mod display;
pub mod irq;
pub mod poll;
pub mod power;
pub mod rig;
pub mod sim;
pub mod sync;

pub use config::{load_config, load_host_config, ConfigError, HostConfig};
pub use display::{BlankEvent, BlankState, DisplayNotifier};
pub use rig::{HostMutex, SimDevice, SimRig};
pub use sync::StdRawMutex;
