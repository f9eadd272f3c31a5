//! Threaded interrupt line
//!
//! A dedicated thread plays the role of the interrupt bottom half. The
//! line level is driven by whoever simulates the controller; the thread
//! runs the handler one-shot, with the line implicitly masked while the
//! handler executes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle, ThreadId};

use hxspi_hal::{DataReadyHandler, IrqLine, Trigger};
use log::{debug, warn};

/// Interrupt line errors
#[derive(Debug, thiserror::Error)]
pub enum IrqError {
    #[error("no interrupt line configured")]
    Unavailable,
    #[error("interrupt handler already installed")]
    AlreadyRequested,
    #[error("failed to spawn interrupt thread")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Default)]
struct LineState {
    /// Line held low by the controller
    asserted: bool,
    /// Falling edge seen while the handler could not run
    edge_pending: bool,
    masked: bool,
    trigger: Option<Trigger>,
    running: bool,
    shutdown: bool,
}

impl LineState {
    fn should_fire(&self) -> bool {
        if self.masked {
            return false;
        }
        match self.trigger {
            Some(Trigger::EdgeFalling) => self.edge_pending,
            Some(Trigger::LevelLow) => self.asserted,
            None => false,
        }
    }
}

struct Shared {
    state: Mutex<LineState>,
    cond: Condvar,
    handled: AtomicUsize,
    enables: AtomicUsize,
    disables: AtomicUsize,
    wake: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, LineState> {
        // A panicking handler must not wedge teardown
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct Worker {
    handle: JoinHandle<()>,
    id: ThreadId,
}

/// Interrupt line serviced by its own thread
pub struct ThreadedIrq {
    valid: bool,
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl ThreadedIrq {
    /// A usable line, idle (not asserted)
    pub fn new() -> Self {
        Self::with_validity(true)
    }

    /// A line that failed to resolve; registration must fall back to polling
    pub fn unavailable() -> Self {
        Self::with_validity(false)
    }

    fn with_validity(valid: bool) -> Self {
        Self {
            valid,
            shared: Arc::new(Shared {
                state: Mutex::new(LineState::default()),
                cond: Condvar::new(),
                handled: AtomicUsize::new(0),
                enables: AtomicUsize::new(0),
                disables: AtomicUsize::new(0),
                wake: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Handle for driving the line level from a simulated controller
    pub fn pin(&self) -> IrqPin {
        IrqPin {
            shared: self.shared.clone(),
        }
    }

    /// Handler invocations so far
    pub fn handled(&self) -> usize {
        self.shared.handled.load(Ordering::SeqCst)
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

    /// Whether a handler is installed
    pub fn is_requested(&self) -> bool {
        self.worker
            .lock()
            .map(|worker| worker.is_some())
            .unwrap_or(false)
    }

    fn run<H: DataReadyHandler>(shared: Arc<Shared>, handler: H) {
        let mut state = shared.lock();
        loop {
            while !state.shutdown && !state.should_fire() {
                state = shared.cond.wait(state).unwrap_or_else(|e| e.into_inner());
            }
            if state.shutdown {
                break;
            }

            state.edge_pending = false;
            state.running = true;
            drop(state);

            handler.on_data_ready();
            shared.handled.fetch_add(1, Ordering::SeqCst);

            state = shared.lock();
            state.running = false;
            shared.cond.notify_all();
        }
        debug!("irq thread exiting");
    }
}

impl Default for ThreadedIrq {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqLine for ThreadedIrq {
    type Error = IrqError;

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn request<H>(&self, trigger: Trigger, handler: H) -> Result<(), IrqError>
    where
        H: DataReadyHandler + 'static,
    {
        if !self.valid {
            return Err(IrqError::Unavailable);
        }
        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if worker.is_some() {
            return Err(IrqError::AlreadyRequested);
        }

        {
            let mut state = self.shared.lock();
            state.trigger = Some(trigger);
            state.masked = false;
            state.shutdown = false;
            state.edge_pending = false;
        }

        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name("hxspi-irq".into())
            .spawn(move || Self::run(shared, handler))?;
        *worker = Some(Worker {
            id: handle.thread().id(),
            handle,
        });
        debug!("irq requested ({:?})", trigger);
        Ok(())
    }

    fn free(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(worker) = worker else {
            return;
        };

        {
            let mut state = self.shared.lock();
            state.shutdown = true;
            state.trigger = None;
            self.shared.cond.notify_all();
        }

        // Freeing from inside the handler: the thread exits on return
        if worker.id == thread::current().id() {
            return;
        }
        if worker.handle.join().is_err() {
            warn!("irq thread panicked");
        }
    }

    fn enable(&self) {
        self.shared.enables.fetch_add(1, Ordering::SeqCst);
        let mut state = self.shared.lock();
        state.masked = false;
        self.shared.cond.notify_all();
    }

    fn disable_nosync(&self) {
        self.shared.disables.fetch_add(1, Ordering::SeqCst);
        self.shared.lock().masked = true;
    }

    fn set_wake(&self, enable: bool) -> Result<(), IrqError> {
        if !self.valid {
            return Err(IrqError::Unavailable);
        }
        self.shared.wake.store(enable, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for ThreadedIrq {
    fn drop(&mut self) {
        self.free();
    }
}

/// Controller side of the interrupt line (active low)
#[derive(Clone)]
pub struct IrqPin {
    shared: Arc<Shared>,
}

impl IrqPin {
    /// Pull the line low
    pub fn assert(&self) {
        let mut state = self.shared.lock();
        if !state.asserted {
            state.asserted = true;
            state.edge_pending = true;
        }
        self.shared.cond.notify_all();
    }

    /// Release the line high
    pub fn release(&self) {
        self.shared.lock().asserted = false;
    }

    /// Falling edge followed by release
    pub fn pulse(&self) {
        self.assert();
        self.release();
    }

    pub fn is_asserted(&self) -> bool {
        self.shared.lock().asserted
    }

    /// Block until no handler is running and nothing is waiting to fire
    pub fn wait_idle(&self) {
        let mut state = self.shared.lock();
        while state.running || (!state.shutdown && state.should_fire()) {
            state = self
                .shared
                .cond
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_edge_fires_once_per_pulse() {
        let irq = ThreadedIrq::new();
        let pin = irq.pin();
        let (count, handler) = counter();
        irq.request(Trigger::EdgeFalling, handler).unwrap();

        for _ in 0..3 {
            pin.pulse();
            pin.wait_idle();
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
        irq.free();
    }

    #[test]
    fn test_masked_line_defers_edge() {
        let irq = ThreadedIrq::new();
        let pin = irq.pin();
        let (count, handler) = counter();
        irq.request(Trigger::EdgeFalling, handler).unwrap();

        irq.disable_nosync();
        pin.pulse();
        pin.wait_idle();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        irq.enable();
        pin.wait_idle();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        irq.free();
    }

    #[test]
    fn test_level_fires_until_released() {
        let irq = ThreadedIrq::new();
        let pin = irq.pin();
        let release = pin.clone();
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        irq.request(Trigger::LevelLow, move || {
            // Controller drops the line on the third read
            if inner.fetch_add(1, Ordering::SeqCst) == 2 {
                release.release();
            }
        })
        .unwrap();

        pin.assert();
        pin.wait_idle();
        assert_eq!(count.load(Ordering::SeqCst), 3);
        irq.free();
    }

    #[test]
    fn test_second_request_rejected() {
        let irq = ThreadedIrq::new();
        irq.request(Trigger::LevelLow, || {}).unwrap();
        assert!(matches!(
            irq.request(Trigger::LevelLow, || {}),
            Err(IrqError::AlreadyRequested)
        ));
        irq.free();
        assert!(!irq.is_requested());
    }

    #[test]
    fn test_unavailable_line() {
        let irq = ThreadedIrq::unavailable();
        assert!(!irq.is_valid());
        assert!(matches!(
            irq.request(Trigger::LevelLow, || {}),
            Err(IrqError::Unavailable)
        ));
    }

    #[test]
    fn test_free_waits_for_running_handler() {
        let irq = ThreadedIrq::new();
        let pin = irq.pin();
        let done = Arc::new(AtomicBool::new(false));
        let inner = done.clone();
        irq.request(Trigger::EdgeFalling, move || {
            thread::sleep(std::time::Duration::from_millis(50));
            inner.store(true, Ordering::SeqCst);
        })
        .unwrap();

        pin.pulse();
        // Let the handler start
        while !pin.shared.lock().running {
            thread::yield_now();
        }
        irq.free();
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn test_free_without_request_is_noop() {
        let irq = ThreadedIrq::new();
        irq.free();
        irq.free();
    }
}
