//! Device context
//!
//! One value per attached controller. Bring-up order:
//!
//! 1. Validate configuration
//! 2. Check the bus can carry full-duplex transactions
//! 3. Allocate the transfer buffer
//! 4. Power up and release reset
//! 5. Register the dispatcher (separately, once the caller can build its
//!    data-ready handler around the device)
//!
//! A failed step releases everything acquired before it. Teardown runs in
//! reverse: dispatcher first, then power.

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use hxspi_hal::{DataReadyHandler, IrqLine, PollScheduler, PowerSequencer, SpiBus};

use crate::bus::BusEngine;
use crate::config::{BusConfig, DeviceConfig, DeviceInfo};
use crate::dispatch::{DispatchMode, Dispatcher};
use crate::error::{Error, LifecycleStage};
use crate::fmt::{debug, error, info};

#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    probe_finished: bool,
    initialized: bool,
    boot_done: bool,
    suspended: bool,
    torn_down: bool,
}

/// One attached controller
pub struct Device<M, B, L, P, S>
where
    M: RawMutex,
    B: SpiBus,
    L: IrqLine,
    P: PollScheduler,
    S: PowerSequencer,
{
    info: DeviceInfo,
    engine: BusEngine<M, B>,
    dispatcher: Dispatcher<M, L, P>,
    power: Mutex<M, RefCell<S>>,
    flags: Mutex<M, Cell<Flags>>,
}

impl<M, B, L, P, S> Device<M, B, L, P, S>
where
    M: RawMutex,
    B: SpiBus,
    L: IrqLine,
    P: PollScheduler,
    S: PowerSequencer,
{
    /// Bring the controller up to the point where bus I/O is possible
    pub fn attach(
        config: DeviceConfig,
        bus: B,
        line: L,
        poller: P,
        mut power: S,
    ) -> Result<Self, Error> {
        config.validate().inspect_err(|_| {
            error!("attach: invalid configuration");
        })?;

        if !bus.is_full_duplex() {
            error!("attach: bus is not full duplex");
            return Err(Error::Lifecycle(LifecycleStage::Bus));
        }

        let engine = BusEngine::new(config.bus, &config.info, bus).inspect_err(|_| {
            error!(
                "attach: cannot allocate {} byte transfer buffer",
                config.bus.max_transfer_len
            );
        })?;

        if power.power_up().is_err() {
            error!("attach: power up failed");
            power.power_down();
            return Err(Error::Lifecycle(LifecycleStage::PowerUp));
        }

        info!("attach: {} powered", config.info.chip_name.as_str());
        Ok(Self {
            dispatcher: Dispatcher::new(line, poller, &config.info, config.poll),
            info: config.info,
            engine,
            power: Mutex::new(RefCell::new(power)),
            flags: Mutex::new(Cell::new(Flags::default())),
        })
    }

    /// Establish the data-ready path and mark the device initialized
    ///
    /// On [`Error::RegistrationFailure`] bring-up is over; detach the
    /// device to release power.
    ///
    /// The handler runs on threads this device owns. A handler holding a
    /// strong reference to the device keeps it alive until
    /// [`unregister_dispatcher`](Self::unregister_dispatcher); hold a weak
    /// one to let drop tear it down.
    pub fn register_dispatcher<H>(&self, handler: H) -> Result<DispatchMode, Error>
    where
        H: DataReadyHandler + Clone + 'static,
    {
        let mode = self.dispatcher.register(handler)?;
        self.update(|flags| {
            flags.initialized = true;
            flags.probe_finished = true;
        });
        info!("device initialized");
        Ok(mode)
    }

    /// Tear down the data-ready path
    ///
    /// Returns once the handler is no longer running. Idempotent. A
    /// suspend in effect ends with it; the next registration starts
    /// awake.
    pub fn unregister_dispatcher(&self) {
        self.dispatcher.unregister();
        self.update(|flags| {
            flags.initialized = false;
            flags.suspended = false;
        });
    }

    /// Mask or unmask the interrupt line (interrupt mode only)
    pub fn set_interrupt_enabled(&self, enable: bool) {
        self.dispatcher.set_interrupt_enabled(enable);
    }

    /// Read `buf.len()` bytes of response to `command`
    pub fn bus_read(&self, command: u8, buf: &mut [u8]) -> Result<(), Error> {
        self.engine.read(command, buf)
    }

    /// Write `data` to `command`, optionally at a register address
    pub fn bus_write(&self, command: u8, address: Option<u32>, data: &[u8]) -> Result<usize, Error> {
        self.engine.write(command, address, data)
    }

    /// Switch addressing modes for subsequent transactions
    pub fn set_slave_register_mode(&self, enabled: bool) {
        self.engine.set_slave_register_mode(enabled);
    }

    /// Drive the reset line
    pub fn reset_assert(&self, asserted: bool) {
        self.power
            .lock(|power| power.borrow_mut().reset_assert(asserted));
    }

    /// Quiesce the device for system sleep
    ///
    /// Masks the interrupt line unless it is the wakeup source.
    pub fn suspend(&self) -> Result<(), Error> {
        let flags = self.flags();
        if !flags.initialized {
            debug!("suspend: not initialized");
            return Err(Error::NotReady);
        }
        if flags.suspended {
            debug!("suspend: already suspended");
            return Ok(());
        }

        if !self.info.smart_wakeup {
            self.dispatcher.set_interrupt_enabled(false);
        }
        self.update(|flags| flags.suspended = true);
        info!("device suspended");
        Ok(())
    }

    /// Undo [`suspend`](Self::suspend)
    pub fn resume(&self) -> Result<(), Error> {
        let flags = self.flags();
        if !flags.initialized {
            debug!("resume: not initialized");
            return Err(Error::NotReady);
        }
        if !flags.suspended {
            debug!("resume: not suspended");
            return Ok(());
        }

        self.dispatcher.set_interrupt_enabled(true);
        self.update(|flags| flags.suspended = false);
        info!("device resumed");
        Ok(())
    }

    /// Record that the controller finished booting its firmware
    pub fn mark_boot_done(&self) {
        self.update(|flags| flags.boot_done = true);
    }

    /// Whether the controller finished booting its firmware
    pub fn is_boot_done(&self) -> bool {
        self.flags().boot_done
    }

    /// Whether power-up and dispatcher registration both succeeded
    pub fn is_initialized(&self) -> bool {
        self.flags().initialized
    }

    /// Whether bring-up ran to completion at least once
    pub fn is_probe_finished(&self) -> bool {
        self.flags().probe_finished
    }

    pub fn is_suspended(&self) -> bool {
        self.flags().suspended
    }

    /// Live dispatch mode, if registered
    pub fn dispatch_mode(&self) -> Option<DispatchMode> {
        self.dispatcher.mode()
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.dispatcher.interrupt_enabled()
    }

    /// Operations that exhausted their bus retries
    pub fn bus_error_count(&self) -> u32 {
        self.engine.error_count()
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn bus_config(&self) -> &BusConfig {
        self.engine.config()
    }

    /// Exclusive access to the raw bus, bypassing framing
    pub fn with_bus<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        self.engine.with_bus(f)
    }

    /// Tear the device down and release every resource
    pub fn detach(self) {
        self.teardown();
    }

    fn teardown(&self) {
        let already = self.flags.lock(|cell| {
            let mut flags = cell.get();
            let already = flags.torn_down;
            flags.torn_down = true;
            cell.set(flags);
            already
        });
        if already {
            return;
        }

        self.dispatcher.unregister();
        self.power.lock(|power| power.borrow_mut().power_down());
        self.update(|flags| {
            flags.initialized = false;
            flags.suspended = false;
        });
        info!("device detached");
    }

    fn flags(&self) -> Flags {
        self.flags.lock(|cell| cell.get())
    }

    fn update(&self, f: impl FnOnce(&mut Flags)) {
        self.flags.lock(|cell| {
            let mut flags = cell.get();
            f(&mut flags);
            cell.set(flags);
        });
    }
}

impl<M, B, L, P, S> Drop for Device<M, B, L, P, S>
where
    M: RawMutex,
    B: SpiBus,
    L: IrqLine,
    P: PollScheduler,
    S: PowerSequencer,
{
    fn drop(&mut self) {
        self.teardown();
    }
}
