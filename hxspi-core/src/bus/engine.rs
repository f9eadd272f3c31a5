//! Bus transaction engine
//!
//! Frames read and write commands into SPI transactions. One device-wide
//! lock covers header build, staging and the transaction itself, so at
//! most one transaction is in flight per device. Acquisition order is
//! whatever the lock grants; only mutual exclusion is guaranteed.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use hxspi_hal::SpiBus;

use super::buffer::TransferBuffer;
use super::frame::{self, Addressing};
use crate::config::{BusConfig, DeviceInfo, READ_HEADER_LEN};
use crate::error::Error;
use crate::fmt::{debug, error, warn};

/// Everything only the lock holder may touch
struct BusState<B> {
    bus: B,
    buffer: TransferBuffer,
    slave_register_mode: bool,
    error_count: u32,
}

/// Framed, retried, mutually exclusive access to one controller
pub struct BusEngine<M: RawMutex, B: SpiBus> {
    config: BusConfig,
    addressing: Addressing,
    state: Mutex<M, RefCell<BusState<B>>>,
}

impl<M: RawMutex, B: SpiBus> BusEngine<M, B> {
    /// Allocate the transfer buffer and take ownership of the bus
    pub fn new(config: BusConfig, info: &DeviceInfo, bus: B) -> Result<Self, Error> {
        config.validate()?;
        let buffer = TransferBuffer::try_new(config.max_transfer_len)?;
        Ok(Self {
            addressing: Addressing::new(&config, info),
            config,
            state: Mutex::new(RefCell::new(BusState {
                bus,
                buffer,
                slave_register_mode: info.use_slave_register_mode,
                error_count: 0,
            })),
        })
    }

    /// Bus limits this engine enforces
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Read `buf.len()` response bytes for `command`
    ///
    /// `buf` is written only on success.
    pub fn read(&self, command: u8, buf: &mut [u8]) -> Result<(), Error> {
        let len = buf.len();
        if len > self.config.max_read_len {
            error!(
                "bus read: len {} is over {}",
                len, self.config.max_read_len
            );
            return Err(Error::ContractViolation {
                len,
                limit: self.config.max_read_len,
            });
        }

        let retries = self.config.retries;
        self.state.lock(|cell| {
            let mut guard = cell.borrow_mut();
            let state = &mut *guard;
            let selectors = self.addressing.select(state.slave_register_mode);
            if state.slave_register_mode {
                debug!("bus read: slave register 0x{:02X}", selectors.read);
            }
            let header = frame::read_header(selectors.read, command);

            for attempt in 1..=retries {
                // The previous attempt may have clobbered the header.
                let staged = state.buffer.stage_read(header, len)?;
                match state.bus.transfer_in_place(staged) {
                    Ok(()) => {
                        buf.copy_from_slice(&staged[READ_HEADER_LEN..]);
                        return Ok(());
                    }
                    Err(_) => warn!("SPI read error on attempt {}/{}", attempt, retries),
                }
            }

            state.error_count = state.error_count.saturating_add(1);
            error!("SPI read error retry over {}", retries);
            Err(Error::Transport { attempts: retries })
        })
    }

    /// Write `data` for `command`, optionally preceded by a register address
    ///
    /// The address counts toward the write limit. Returns the number of
    /// bytes transacted, header included.
    pub fn write(&self, command: u8, address: Option<u32>, data: &[u8]) -> Result<usize, Error> {
        let len = frame::write_payload_len(address, data.len());
        if len > self.config.max_write_len {
            error!(
                "bus write: len {} is over {}",
                len, self.config.max_write_len
            );
            return Err(Error::ContractViolation {
                len,
                limit: self.config.max_write_len,
            });
        }

        let retries = self.config.retries;
        self.state.lock(|cell| {
            let mut guard = cell.borrow_mut();
            let state = &mut *guard;
            let selectors = self.addressing.select(state.slave_register_mode);
            if state.slave_register_mode {
                debug!("bus write: slave register 0x{:02X}", selectors.write);
            }
            let header = frame::write_header(selectors.write, command);
            let staged = state
                .buffer
                .stage_write(header, address.map(frame::encode_address), data)?;

            for attempt in 1..=retries {
                match state.bus.write(staged) {
                    Ok(transacted) => return Ok(transacted),
                    Err(_) => warn!("SPI write error on attempt {}/{}", attempt, retries),
                }
            }

            state.error_count = state.error_count.saturating_add(1);
            error!("SPI write error retry over {}", retries);
            Err(Error::Transport { attempts: retries })
        })
    }

    /// Switch between default and slave-register selectors
    pub fn set_slave_register_mode(&self, enabled: bool) {
        self.state
            .lock(|cell| cell.borrow_mut().slave_register_mode = enabled);
    }

    /// Whether slave-register selectors are in use
    pub fn slave_register_mode(&self) -> bool {
        self.state.lock(|cell| cell.borrow().slave_register_mode)
    }

    /// Operations that exhausted their retries since attach
    pub fn error_count(&self) -> u32 {
        self.state.lock(|cell| cell.borrow().error_count)
    }

    /// Run `f` with exclusive access to the raw bus
    ///
    /// Holds the bus lock for the duration, so no framed transaction can
    /// interleave.
    pub fn with_bus<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        self.state.lock(|cell| f(&mut cell.borrow_mut().bus))
    }

    /// Free the transfer buffer and hand the bus back
    pub fn release(self) -> B {
        self.state.into_inner().into_inner().bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBus, TestMutex};
    use alloc::vec;
    use proptest::prelude::*;

    fn small_config() -> BusConfig {
        BusConfig::with_transfer_len(64)
    }

    fn engine(bus: MockBus) -> BusEngine<TestMutex, MockBus> {
        BusEngine::new(small_config(), &DeviceInfo::default(), bus).unwrap()
    }

    #[test]
    fn test_read_frames_header_and_returns_tail() {
        let bus = MockBus::new();
        bus.queue_response(&[0, 0, 0, 0xAA, 0xBB, 0xCC, 0xDD]);
        let engine = engine(bus.clone());

        let mut out = [0u8; 4];
        engine.read(0x10, &mut out).unwrap();

        assert_eq!(out, [0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(bus.transactions(), vec![vec![0xF3, 0x10, 0x00, 0, 0, 0, 0]]);
    }

    #[test]
    fn test_write_frames_address_lsb_first() {
        let bus = MockBus::new();
        let engine = engine(bus.clone());

        let n = engine.write(0x20, Some(0x1000_0000), &[0x01, 0x02]).unwrap();

        assert_eq!(n, 8);
        assert_eq!(
            bus.transactions(),
            vec![vec![0xF2, 0x20, 0x00, 0x00, 0x00, 0x10, 0x01, 0x02]]
        );
    }

    #[test]
    fn test_write_without_address() {
        let bus = MockBus::new();
        let engine = engine(bus.clone());

        engine.write(0x31, None, &[0x27]).unwrap();
        assert_eq!(bus.transactions(), vec![vec![0xF2, 0x31, 0x27]]);
    }

    #[test]
    fn test_slave_register_mode_swaps_selectors() {
        let bus = MockBus::new();
        let mut info = DeviceInfo::default();
        info.slave_read_reg = 0x61;
        info.slave_write_reg = 0x60;
        let engine: BusEngine<TestMutex, MockBus> =
            BusEngine::new(small_config(), &info, bus.clone()).unwrap();

        engine.set_slave_register_mode(true);
        assert!(engine.slave_register_mode());

        let mut out = [0u8; 1];
        engine.read(0x08, &mut out).unwrap();
        engine.write(0x08, None, &[0x00]).unwrap();

        let tx = bus.transactions();
        assert_eq!(tx[0][0], 0x61);
        assert_eq!(tx[1][0], 0x60);
    }

    #[test]
    fn test_read_retries_then_succeeds() {
        let bus = MockBus::new();
        bus.fail_next(2);
        bus.queue_response(&[0, 0, 0, 0x5A]);
        let engine = engine(bus.clone());

        let mut out = [0u8; 1];
        engine.read(0x10, &mut out).unwrap();

        assert_eq!(out, [0x5A]);
        assert_eq!(bus.attempts(), 3);
        // Every attempt carries a clean header
        assert!(bus.transactions().iter().all(|t| t[..3] == [0xF3, 0x10, 0x00]));
        assert_eq!(engine.error_count(), 0);
    }

    #[test]
    fn test_read_exhaustion_leaves_output_untouched() {
        let bus = MockBus::new();
        bus.fail_next(3);
        let engine = engine(bus.clone());

        let mut out = [0x77u8; 4];
        let result = engine.read(0x10, &mut out);

        assert_eq!(result, Err(Error::Transport { attempts: 3 }));
        assert_eq!(out, [0x77; 4]);
        assert_eq!(bus.attempts(), 3);
        assert_eq!(engine.error_count(), 1);
    }

    #[test]
    fn test_write_exhaustion() {
        let bus = MockBus::new();
        bus.fail_next(5);
        let engine = engine(bus.clone());

        let result = engine.write(0x20, None, &[1, 2, 3]);
        assert_eq!(result, Err(Error::Transport { attempts: 3 }));
        assert_eq!(engine.error_count(), 1);
    }

    #[test]
    fn test_release_returns_bus() {
        let bus = MockBus::new();
        let engine = engine(bus.clone());
        engine.write(0x20, None, &[]).unwrap();
        let released = engine.release();
        assert_eq!(released.attempts(), 1);
    }

    proptest! {
        #[test]
        fn prop_oversized_read_never_touches_bus(extra in 1usize..256) {
            let bus = MockBus::new();
            let engine = engine(bus.clone());
            let len = small_config().max_read_len + extra;
            let mut out = vec![0u8; len];

            let result = engine.read(0x10, &mut out);

            prop_assert!(result.unwrap_err().is_contract_violation());
            prop_assert_eq!(bus.attempts(), 0);
        }

        #[test]
        fn prop_oversized_write_never_touches_bus(extra in 1usize..256, with_address in any::<bool>()) {
            let bus = MockBus::new();
            let engine = engine(bus.clone());
            let limit = small_config().max_write_len;
            let data_len = if with_address { limit - 4 + extra } else { limit + extra };
            let data = vec![0u8; data_len];
            let address = if with_address { Some(0x1000_0000) } else { None };

            let result = engine.write(0x20, address, &data);

            prop_assert!(result.unwrap_err().is_contract_violation());
            prop_assert_eq!(bus.attempts(), 0);
        }

        #[test]
        fn prop_write_at_limit_is_accepted(with_address in any::<bool>()) {
            let bus = MockBus::new();
            let engine = engine(bus.clone());
            let limit = small_config().max_write_len;
            let data_len = if with_address { limit - 4 } else { limit };
            let data = vec![0u8; data_len];
            let address = if with_address { Some(0) } else { None };

            prop_assert_eq!(engine.write(0x20, address, &data), Ok(limit + 2));
        }
    }
}
