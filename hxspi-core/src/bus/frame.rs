//! Byte-exact transaction framing
//!
//! Read transaction:
//! ```text
//! ┌──────────┬─────────┬──────┬────────────────────┐
//! │ SELECTOR │ COMMAND │ 0x00 │ RESPONSE (len)     │
//! └──────────┴─────────┴──────┴────────────────────┘
//! ```
//!
//! Write transaction:
//! ```text
//! ┌──────────┬─────────┬────────────────────┬─────────┐
//! │ SELECTOR │ COMMAND │ ADDRESS (opt, 4B)  │ PAYLOAD │
//! └──────────┴─────────┴────────────────────┴─────────┘
//! ```
//!
//! The address goes out least significant byte first regardless of the
//! host's byte order.

use crate::config::{BusConfig, DeviceInfo, ADDRESS_LEN, READ_HEADER_LEN, WRITE_HEADER_LEN};

/// Selector bytes for one addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Selectors {
    /// First byte of a read header
    pub read: u8,
    /// First byte of a write header
    pub write: u8,
}

/// Selectors for the default and slave-register addressing modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Addressing {
    /// Fixed protocol selectors
    pub default: Selectors,
    /// Device-configured alternate selectors
    pub slave_register: Selectors,
}

impl Addressing {
    /// Collect both selector pairs from configuration
    pub fn new(bus: &BusConfig, info: &DeviceInfo) -> Self {
        Self {
            default: Selectors {
                read: bus.read_selector,
                write: bus.write_selector,
            },
            slave_register: Selectors {
                read: info.slave_read_reg,
                write: info.slave_write_reg,
            },
        }
    }

    /// Selectors for the current mode
    pub fn select(&self, slave_register_mode: bool) -> Selectors {
        if slave_register_mode {
            self.slave_register
        } else {
            self.default
        }
    }
}

/// Build a read header
pub fn read_header(selector: u8, command: u8) -> [u8; READ_HEADER_LEN] {
    [selector, command, 0x00]
}

/// Build a write header
pub fn write_header(selector: u8, command: u8) -> [u8; WRITE_HEADER_LEN] {
    [selector, command]
}

/// Encode a register address in wire order (least significant byte first)
pub fn encode_address(address: u32) -> [u8; ADDRESS_LEN] {
    [
        address as u8,
        (address >> 8) as u8,
        (address >> 16) as u8,
        (address >> 24) as u8,
    ]
}

/// Decode a wire-order register address
pub fn decode_address(bytes: [u8; ADDRESS_LEN]) -> u32 {
    (bytes[0] as u32)
        | ((bytes[1] as u32) << 8)
        | ((bytes[2] as u32) << 16)
        | ((bytes[3] as u32) << 24)
}

/// Payload length of a write as checked against the write limit
///
/// The address counts toward the limit.
pub fn write_payload_len(address: Option<u32>, data_len: usize) -> usize {
    match address {
        Some(_) => data_len.saturating_add(ADDRESS_LEN),
        None => data_len,
    }
}
