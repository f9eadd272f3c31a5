//! Test doubles for the platform traits

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use hxspi_hal::{DataReadyHandler, IrqLine, PollScheduler, PollTiming, PowerSequencer, SpiBus, Trigger};

pub type TestMutex = CriticalSectionRawMutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

#[derive(Default)]
struct BusLog {
    transactions: Vec<Vec<u8>>,
    responses: VecDeque<Vec<u8>>,
    fail_remaining: usize,
    half_duplex: bool,
}

/// SPI bus that records every attempt and replays queued responses
///
/// Clones share state so a test can inspect the bus after handing it over.
#[derive(Clone, Default)]
pub struct MockBus {
    log: Arc<Mutex<BusLog>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn half_duplex() -> Self {
        let bus = Self::default();
        bus.log.lock().unwrap().half_duplex = true;
        bus
    }

    /// Full frame to return from the next successful transfer
    pub fn queue_response(&self, frame: &[u8]) {
        self.log.lock().unwrap().responses.push_back(frame.to_vec());
    }

    /// Fail the next `n` attempts
    pub fn fail_next(&self, n: usize) {
        self.log.lock().unwrap().fail_remaining = n;
    }

    /// Transmitted bytes of every attempt, failed ones included
    pub fn transactions(&self) -> Vec<Vec<u8>> {
        self.log.lock().unwrap().transactions.clone()
    }

    pub fn attempts(&self) -> usize {
        self.log.lock().unwrap().transactions.len()
    }

    fn record(log: &mut BusLog, tx: &[u8]) -> Result<(), MockError> {
        log.transactions.push(tx.to_vec());
        if log.fail_remaining > 0 {
            log.fail_remaining -= 1;
            return Err(MockError);
        }
        Ok(())
    }
}

impl SpiBus for MockBus {
    type Error = MockError;

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), MockError> {
        let mut log = self.log.lock().unwrap();
        Self::record(&mut log, data)?;
        if let Some(response) = log.responses.pop_front() {
            let n = response.len().min(data.len());
            data[..n].copy_from_slice(&response[..n]);
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, MockError> {
        let mut log = self.log.lock().unwrap();
        Self::record(&mut log, data)?;
        Ok(data.len())
    }

    fn is_full_duplex(&self) -> bool {
        !self.log.lock().unwrap().half_duplex
    }
}

#[derive(Default)]
struct IrqShared {
    valid: AtomicBool,
    reject_request: AtomicBool,
    requests: AtomicUsize,
    frees: AtomicUsize,
    enables: AtomicUsize,
    disables: AtomicUsize,
    wake: AtomicBool,
    trigger: Mutex<Option<Trigger>>,
    handler: Mutex<Option<Box<dyn DataReadyHandler>>>,
}

/// Interrupt line with call counters and a manual trigger
#[derive(Clone)]
pub struct MockIrqLine {
    shared: Arc<IrqShared>,
}

impl MockIrqLine {
    pub fn new() -> Self {
        let line = Self {
            shared: Arc::new(IrqShared::default()),
        };
        line.shared.valid.store(true, Ordering::SeqCst);
        line
    }

    /// No interrupt number was resolved
    pub fn invalid() -> Self {
        let line = Self::new();
        line.shared.valid.store(false, Ordering::SeqCst);
        line
    }

    /// Valid line whose registration fails
    pub fn rejecting() -> Self {
        let line = Self::new();
        line.shared.reject_request.store(true, Ordering::SeqCst);
        line
    }

    /// Run the installed handler as the interrupt thread would
    pub fn fire(&self) -> bool {
        match self.shared.handler.lock().unwrap().as_ref() {
            Some(handler) => {
                handler.on_data_ready();
                true
            }
            None => false,
        }
    }

    pub fn requests(&self) -> usize {
        self.shared.requests.load(Ordering::SeqCst)
    }

    pub fn frees(&self) -> usize {
        self.shared.frees.load(Ordering::SeqCst)
    }

    pub fn enables(&self) -> usize {
        self.shared.enables.load(Ordering::SeqCst)
    }

    pub fn disables(&self) -> usize {
        self.shared.disables.load(Ordering::SeqCst)
    }

    pub fn wake_enabled(&self) -> bool {
        self.shared.wake.load(Ordering::SeqCst)
    }

    pub fn trigger(&self) -> Option<Trigger> {
        *self.shared.trigger.lock().unwrap()
    }

    pub fn has_handler(&self) -> bool {
        self.shared.handler.lock().unwrap().is_some()
    }
}

impl IrqLine for MockIrqLine {
    type Error = MockError;

    fn is_valid(&self) -> bool {
        self.shared.valid.load(Ordering::SeqCst)
    }

    fn request<H>(&self, trigger: Trigger, handler: H) -> Result<(), MockError>
    where
        H: DataReadyHandler + 'static,
    {
        self.shared.requests.fetch_add(1, Ordering::SeqCst);
        if self.shared.reject_request.load(Ordering::SeqCst) {
            return Err(MockError);
        }
        *self.shared.trigger.lock().unwrap() = Some(trigger);
        *self.shared.handler.lock().unwrap() = Some(Box::new(handler));
        Ok(())
    }

    fn free(&self) {
        self.shared.frees.fetch_add(1, Ordering::SeqCst);
        *self.shared.handler.lock().unwrap() = None;
    }

    fn enable(&self) {
        self.shared.enables.fetch_add(1, Ordering::SeqCst);
    }

    fn disable_nosync(&self) {
        self.shared.disables.fetch_add(1, Ordering::SeqCst);
    }

    fn set_wake(&self, enable: bool) -> Result<(), MockError> {
        self.shared.wake.store(enable, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct PollShared {
    reject_start: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    timing: Mutex<Option<PollTiming>>,
    handler: Mutex<Option<Box<dyn DataReadyHandler>>>,
}

/// Poll scheduler whose ticks are driven by the test
#[derive(Clone, Default)]
pub struct MockPoller {
    shared: Arc<PollShared>,
}

impl MockPoller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting() -> Self {
        let poller = Self::default();
        poller.shared.reject_start.store(true, Ordering::SeqCst);
        poller
    }

    /// Run one work item
    pub fn tick(&self) -> bool {
        match self.shared.handler.lock().unwrap().as_ref() {
            Some(handler) => {
                handler.on_data_ready();
                true
            }
            None => false,
        }
    }

    pub fn starts(&self) -> usize {
        self.shared.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.shared.stops.load(Ordering::SeqCst)
    }

    pub fn timing(&self) -> Option<PollTiming> {
        *self.shared.timing.lock().unwrap()
    }

    pub fn is_running(&self) -> bool {
        self.shared.handler.lock().unwrap().is_some()
    }
}

impl PollScheduler for MockPoller {
    type Error = MockError;

    fn start<H>(&self, timing: PollTiming, handler: H) -> Result<(), MockError>
    where
        H: DataReadyHandler + 'static,
    {
        self.shared.starts.fetch_add(1, Ordering::SeqCst);
        if self.shared.reject_start.load(Ordering::SeqCst) {
            return Err(MockError);
        }
        *self.shared.timing.lock().unwrap() = Some(timing);
        *self.shared.handler.lock().unwrap() = Some(Box::new(handler));
        Ok(())
    }

    fn stop(&self) {
        self.shared.stops.fetch_add(1, Ordering::SeqCst);
        *self.shared.handler.lock().unwrap() = None;
    }
}

#[derive(Default)]
struct PowerShared {
    reject_power_up: AtomicBool,
    power_ups: AtomicUsize,
    power_downs: AtomicUsize,
    reset: AtomicBool,
}

/// Power sequencer with counters
#[derive(Clone, Default)]
pub struct MockPower {
    shared: Arc<PowerShared>,
}

impl MockPower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting() -> Self {
        let power = Self::default();
        power.shared.reject_power_up.store(true, Ordering::SeqCst);
        power
    }

    pub fn power_ups(&self) -> usize {
        self.shared.power_ups.load(Ordering::SeqCst)
    }

    pub fn power_downs(&self) -> usize {
        self.shared.power_downs.load(Ordering::SeqCst)
    }

    pub fn in_reset(&self) -> bool {
        self.shared.reset.load(Ordering::SeqCst)
    }
}

impl PowerSequencer for MockPower {
    type Error = MockError;

    fn power_up(&mut self) -> Result<(), MockError> {
        self.shared.power_ups.fetch_add(1, Ordering::SeqCst);
        if self.shared.reject_power_up.load(Ordering::SeqCst) {
            return Err(MockError);
        }
        Ok(())
    }

    fn power_down(&mut self) {
        self.shared.power_downs.fetch_add(1, Ordering::SeqCst);
    }

    fn reset_assert(&mut self, asserted: bool) {
        self.shared.reset.store(asserted, Ordering::SeqCst);
    }
}
