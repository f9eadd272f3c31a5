//! Configuration type definitions
//!
//! Retry counts and length limits differ between platforms, so they are
//! plain configuration rather than constants baked into the core.
//! Defaults match the hx83108b SPI platform.

use core::fmt::Write;

use heapless::String;
use hxspi_hal::PollTiming;

use crate::error::{Error, LifecycleStage};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Read header: selector, command, reserved
pub const READ_HEADER_LEN: usize = 3;

/// Write header: selector, command
pub const WRITE_HEADER_LEN: usize = 2;

/// Encoded register address length
pub const ADDRESS_LEN: usize = 4;

/// Default transfer buffer size (largest single transaction)
pub const DEFAULT_MAX_TRANSFER_LEN: usize = 0x2_0006;

/// Default raw-transaction attempts per bus operation
pub const DEFAULT_RETRIES: u8 = 3;

/// Default read selector byte
pub const DEFAULT_READ_SELECTOR: u8 = 0xF3;

/// Default write selector byte
pub const DEFAULT_WRITE_SELECTOR: u8 = 0xF2;

/// Shortest poll period a timer is armed with (ms)
pub const MIN_POLL_PERIOD_MS: u32 = 1;

/// Maximum chip name length
pub const MAX_CHIP_NAME_LEN: usize = 16;

/// Maximum generated firmware file name length
pub const MAX_FIRMWARE_NAME_LEN: usize = 48;

/// Bus transaction limits and framing bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BusConfig {
    /// Transfer buffer capacity (header included)
    pub max_transfer_len: usize,
    /// Largest read payload
    pub max_read_len: usize,
    /// Largest write payload (address bytes included)
    pub max_write_len: usize,
    /// Raw-transaction attempts before reporting a transport error
    pub retries: u8,
    /// Header selector for reads
    pub read_selector: u8,
    /// Header selector for writes
    pub write_selector: u8,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::with_transfer_len(DEFAULT_MAX_TRANSFER_LEN)
    }
}

impl BusConfig {
    /// Derive read/write limits from a transfer buffer size
    pub fn with_transfer_len(max_transfer_len: usize) -> Self {
        Self {
            max_transfer_len,
            max_read_len: max_transfer_len.saturating_sub(READ_HEADER_LEN),
            max_write_len: max_transfer_len.saturating_sub(WRITE_HEADER_LEN),
            retries: DEFAULT_RETRIES,
            read_selector: DEFAULT_READ_SELECTOR,
            write_selector: DEFAULT_WRITE_SELECTOR,
        }
    }

    /// Check that both limits fit the transfer buffer with their header
    pub fn validate(&self) -> Result<(), Error> {
        let read_fits = self
            .max_read_len
            .checked_add(READ_HEADER_LEN)
            .is_some_and(|n| n <= self.max_transfer_len);
        let write_fits = self
            .max_write_len
            .checked_add(WRITE_HEADER_LEN)
            .is_some_and(|n| n <= self.max_transfer_len);

        if !read_fits || !write_fits || self.retries == 0 {
            return Err(Error::Lifecycle(LifecycleStage::Config));
        }
        Ok(())
    }
}

/// Which firmware image a name is generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FirmwareKind {
    /// Normal boot image
    Boot,
    /// Mass-production test image
    MassProduction,
}

impl FirmwareKind {
    fn tail(self) -> &'static str {
        match self {
            FirmwareKind::Boot => "firmware.bin",
            FirmwareKind::MassProduction => "mpfw.bin",
        }
    }
}

/// Device-reported record consumed by the core
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceInfo {
    /// Interrupt is edge (falling) rather than level (low) triggered
    pub edge_triggered: bool,
    /// Start in slave-register addressing mode
    pub use_slave_register_mode: bool,
    /// Read selector used in slave-register mode
    pub slave_read_reg: u8,
    /// Write selector used in slave-register mode
    pub slave_write_reg: u8,
    /// Interrupt line doubles as a system wakeup source
    pub smart_wakeup: bool,
    /// Controller name, used to build firmware file names
    pub chip_name: String<MAX_CHIP_NAME_LEN>,
    /// Project identifier, absent on generic panels
    pub project_id: Option<u16>,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        let mut chip_name = String::new();
        // Fits: literal is shorter than MAX_CHIP_NAME_LEN
        let _ = chip_name.push_str("HX83108B");
        Self {
            edge_triggered: false,
            use_slave_register_mode: false,
            slave_read_reg: DEFAULT_READ_SELECTOR,
            slave_write_reg: DEFAULT_WRITE_SELECTOR,
            smart_wakeup: false,
            chip_name,
            project_id: None,
        }
    }
}

impl DeviceInfo {
    /// Build the firmware file name for this chip and project
    ///
    /// `HX83108B_1A2B_firmware.bin`, or `HX83108B_firmware.bin` without a
    /// project id.
    pub fn firmware_name(&self, kind: FirmwareKind) -> String<MAX_FIRMWARE_NAME_LEN> {
        let mut name = String::new();
        // Cannot overflow: chip name and tail are both bounded
        let _ = match self.project_id {
            Some(id) => write!(name, "{}_{:04X}_{}", self.chip_name, id, kind.tail()),
            None => write!(name, "{}_{}", self.chip_name, kind.tail()),
        };
        name
    }
}

/// Polling-mode timer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PollConfig {
    /// Delay before the first poll (ms)
    pub initial_delay_ms: u32,
    /// Fixed poll period (ms)
    pub period_ms: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            period_ms: 1000,
        }
    }
}

/// A zero period is raised to [`MIN_POLL_PERIOD_MS`]; the timer never
/// free-runs.
impl From<PollConfig> for PollTiming {
    fn from(config: PollConfig) -> Self {
        let period_ms = config.period_ms.max(MIN_POLL_PERIOD_MS);
        PollTiming {
            initial_delay: core::time::Duration::from_millis(config.initial_delay_ms as u64),
            period: core::time::Duration::from_millis(period_ms as u64),
        }
    }
}

/// Complete device configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceConfig {
    pub bus: BusConfig,
    pub info: DeviceInfo,
    pub poll: PollConfig,
}

impl DeviceConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<(), Error> {
        self.bus.validate()?;
        if self.poll.period_ms == 0 {
            return Err(Error::Lifecycle(LifecycleStage::Config));
        }
        Ok(())
    }
}
