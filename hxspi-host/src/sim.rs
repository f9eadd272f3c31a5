//! Simulated touch controller
//!
//! Speaks the framed protocol well enough to exercise the core end to
//! end:
//!
//! - A write carrying at least an address stores its payload at that
//!   address and leaves the read cursor there.
//! - A read of [`EVENT_COMMAND`] pops the oldest queued touch report and
//!   releases the interrupt line once the queue drains.
//! - Any other read returns memory from the read cursor.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use embedded_hal::spi::{ErrorKind, ErrorType, Operation, SpiDevice};
use hxspi_core::bus::frame;
use hxspi_core::config::{ADDRESS_LEN, READ_HEADER_LEN, WRITE_HEADER_LEN};
use hxspi_hal::spi::SpiConfig;
use hxspi_hal::OutputPin;
use log::trace;

use crate::irq::IrqPin;

/// Command that returns the pending touch report
pub const EVENT_COMMAND: u8 = 0x30;

/// Injected bus failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("injected bus fault")]
    Injected,
    #[error("frame shorter than its header")]
    ShortFrame,
    #[error("clock mode does not match the controller")]
    ClockMode,
    #[error("operation not used by the protocol")]
    Unsupported,
}

#[derive(Default)]
struct SimState {
    memory: BTreeMap<u32, u8>,
    cursor: u32,
    events: VecDeque<Vec<u8>>,
    transactions: Vec<Vec<u8>>,
    fail_remaining: usize,
    irq: Option<IrqPin>,
}

/// Chip-select occupancy, for checking transactions never overlap
#[derive(Default)]
struct Wire {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    latency: Duration,
}

/// Controller model shared between the bus side and the test side
#[derive(Clone)]
pub struct SimulatedTouchIc {
    state: Arc<Mutex<SimState>>,
    wire: Arc<Wire>,
    spi: SpiConfig,
    full_duplex: bool,
}

impl SimulatedTouchIc {
    pub fn new() -> Self {
        Self::with_config(SpiConfig::default())
    }

    pub fn with_config(spi: SpiConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            wire: Arc::default(),
            spi,
            full_duplex: true,
        }
    }

    /// Hold chip select for `latency` on every transaction
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            wire: Arc::new(Wire {
                latency,
                ..Wire::default()
            }),
            ..Self::new()
        }
    }

    /// A controller behind a host that cannot clock both directions
    pub fn half_duplex() -> Self {
        Self {
            full_duplex: false,
            ..Self::new()
        }
    }

    /// Drive `pin` low whenever a report is queued
    pub fn connect_irq(&self, pin: IrqPin) {
        self.lock().irq = Some(pin);
    }

    pub fn spi_config(&self) -> SpiConfig {
        self.spi
    }

    /// Whether the host side can clock both directions at once
    pub fn is_full_duplex(&self) -> bool {
        self.full_duplex
    }

    /// Most transactions ever seen on the wire at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.wire.peak.load(Ordering::SeqCst)
    }

    /// Queue a touch report and raise the interrupt
    pub fn inject_event(&self, report: &[u8]) {
        let pin = {
            let mut state = self.lock();
            state.events.push_back(report.to_vec());
            state.irq.clone()
        };
        if let Some(pin) = pin {
            pin.assert();
        }
    }

    /// Reports not yet read
    pub fn pending_events(&self) -> usize {
        self.lock().events.len()
    }

    /// Fail the next `n` transactions
    pub fn fail_next(&self, n: usize) {
        self.lock().fail_remaining = n;
    }

    /// Every frame clocked out, failed attempts included
    pub fn transactions(&self) -> Vec<Vec<u8>> {
        self.lock().transactions.clone()
    }

    /// Byte stored at `address`
    pub fn peek(&self, address: u32) -> u8 {
        self.lock().memory.get(&address).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(state: &mut SimState, frame: &[u8]) -> Result<(), SimError> {
        state.transactions.push(frame.to_vec());
        if state.fail_remaining > 0 {
            state.fail_remaining -= 1;
            trace!("sim: injected fault");
            return Err(SimError::Injected);
        }
        Ok(())
    }
}

impl Default for SimulatedTouchIc {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTouchIc {
    fn transfer(&self, data: &mut [u8]) -> Result<(), SimError> {
        if data.len() < READ_HEADER_LEN {
            return Err(SimError::ShortFrame);
        }
        let mut state = self.lock();
        Self::record(&mut state, data)?;

        let command = data[1];
        let response = &mut data[READ_HEADER_LEN..];
        if command == EVENT_COMMAND {
            let report = state.events.pop_front().unwrap_or_default();
            let n = report.len().min(response.len());
            response[..n].copy_from_slice(&report[..n]);
            if state.events.is_empty() {
                if let Some(pin) = &state.irq {
                    pin.release();
                }
            }
        } else {
            let base = state.cursor;
            for (offset, byte) in response.iter_mut().enumerate() {
                let address = base.wrapping_add(offset as u32);
                *byte = state.memory.get(&address).copied().unwrap_or(0);
            }
        }
        Ok(())
    }

    fn store(&self, data: &[u8]) -> Result<(), SimError> {
        if data.len() < WRITE_HEADER_LEN {
            return Err(SimError::ShortFrame);
        }
        let mut state = self.lock();
        Self::record(&mut state, data)?;

        let body = &data[WRITE_HEADER_LEN..];
        if body.len() >= ADDRESS_LEN {
            let mut address = [0u8; ADDRESS_LEN];
            address.copy_from_slice(&body[..ADDRESS_LEN]);
            let address = frame::decode_address(address);
            state.cursor = address;
            for (offset, byte) in body[ADDRESS_LEN..].iter().enumerate() {
                state.memory.insert(address.wrapping_add(offset as u32), *byte);
            }
        }
        Ok(())
    }
}

impl embedded_hal::spi::Error for SimError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl ErrorType for SimulatedTouchIc {
    type Error = SimError;
}

impl SpiDevice for SimulatedTouchIc {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), SimError> {
        if embedded_hal::spi::Mode::from(self.spi.mode) != embedded_hal::spi::MODE_3 {
            return Err(SimError::ClockMode);
        }

        // Chip select is asserted for the whole transaction
        let in_flight = self.wire.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.wire.peak.fetch_max(in_flight, Ordering::SeqCst);
        if !self.wire.latency.is_zero() {
            thread::sleep(self.wire.latency);
        }

        let result = operations.iter_mut().try_for_each(|op| match op {
            Operation::TransferInPlace(data) => SimulatedTouchIc::transfer(self, data),
            Operation::Write(data) => self.store(data),
            _ => Err(SimError::Unsupported),
        });
        self.wire.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Pin error injected by [`SimPin::fail`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("simulated pin fault")]
pub struct SimPinError;

/// GPIO line that records every level it is driven to
#[derive(Clone, Default)]
pub struct SimPin {
    level: Arc<AtomicBool>,
    failing: Arc<AtomicBool>,
    history: Arc<Mutex<Vec<bool>>>,
}

impl SimPin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following drive attempt fail
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }

    /// Levels driven so far, in order
    pub fn history(&self) -> Vec<bool> {
        self.history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    fn drive(&self, high: bool) -> Result<(), SimPinError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SimPinError);
        }
        self.level.store(high, Ordering::SeqCst);
        if let Ok(mut history) = self.history.lock() {
            history.push(high);
        }
        Ok(())
    }
}

impl OutputPin for SimPin {
    type Error = SimPinError;

    fn set_high(&mut self) -> Result<(), SimPinError> {
        self.drive(true)
    }

    fn set_low(&mut self) -> Result<(), SimPinError> {
        self.drive(false)
    }
}
