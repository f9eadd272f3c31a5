//! Interrupt/polling dispatcher
//!
//! Establishes exactly one path that delivers data-ready notifications to
//! the handler: a threaded interrupt when the line is usable, otherwise a
//! periodic poll on a single-thread work queue.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use hxspi_hal::{DataReadyHandler, IrqLine, PollScheduler, PollTiming, Trigger};

use super::gate::IrqGate;
use super::state::{DispatchEvent, DispatchMode, DispatchState};
use crate::config::{DeviceInfo, PollConfig};
use crate::error::Error;
use crate::fmt::{debug, error, info, warn};

/// Owns the interrupt line and the poll scheduler for one device
pub struct Dispatcher<M: RawMutex, L: IrqLine, P: PollScheduler> {
    line: L,
    poller: P,
    trigger: Trigger,
    smart_wakeup: bool,
    timing: PollTiming,
    state: Mutex<M, Cell<DispatchState>>,
    gate: IrqGate<M>,
}

impl<M: RawMutex, L: IrqLine, P: PollScheduler> Dispatcher<M, L, P> {
    /// Build an unregistered dispatcher
    ///
    /// A zero poll period is raised to the minimum the timer accepts.
    pub fn new(line: L, poller: P, info: &DeviceInfo, poll: PollConfig) -> Self {
        Self {
            line,
            poller,
            trigger: Trigger::for_device(info.edge_triggered),
            smart_wakeup: info.smart_wakeup,
            timing: poll.into(),
            state: Mutex::new(Cell::new(DispatchState::Unregistered)),
            gate: IrqGate::new(false),
        }
    }

    /// Establish a notification path for `handler`
    ///
    /// Tries the interrupt line first and falls back to polling when the
    /// line is unavailable or its registration fails. Calling this while a
    /// path is live returns the live mode without registering again.
    ///
    /// Registration is not reentrant: call it from one thread at a time.
    pub fn register<H>(&self, handler: H) -> Result<DispatchMode, Error>
    where
        H: DataReadyHandler + Clone + 'static,
    {
        if let Some(mode) = self.mode() {
            warn!("dispatcher already registered");
            return Ok(mode);
        }

        if self.line.is_valid() {
            // Mark IRQ mode before the line can fire
            self.apply(DispatchEvent::IrqRegistered);
            self.gate.force(true);

            match self.line.request(self.trigger, handler.clone()) {
                Ok(()) => {
                    if self.smart_wakeup && self.line.set_wake(true).is_err() {
                        warn!("failed to mark interrupt as wakeup source");
                    }
                    info!("dispatcher: interrupt mode");
                    return Ok(DispatchMode::Irq);
                }
                Err(_) => {
                    self.gate.force(false);
                    self.apply(DispatchEvent::RegistrationFailed);
                    warn!("interrupt request failed, falling back to polling");
                }
            }
        } else {
            info!("no interrupt line, using polling");
        }

        match self.poller.start(self.timing, handler) {
            Ok(()) => {
                self.apply(DispatchEvent::PollingStarted);
                info!("dispatcher: polling mode");
                Ok(DispatchMode::Polling)
            }
            Err(_) => {
                error!("failed to start polling");
                Err(Error::RegistrationFailure)
            }
        }
    }

    /// Tear down whichever path is live
    ///
    /// Returns once no handler invocation can start or is still running.
    /// Safe to call repeatedly and on a dispatcher that never registered.
    pub fn unregister(&self) {
        // Platform calls below may wait on the handler, which may itself
        // take our locks; release them first.
        let previous = self.state.lock(|state| {
            let previous = state.get();
            state.set(previous.transition(DispatchEvent::TornDown));
            previous
        });

        match previous {
            DispatchState::Irq => {
                if self.smart_wakeup && self.line.set_wake(false).is_err() {
                    warn!("failed to clear interrupt wakeup");
                }
                self.line.free();
                self.gate.force(false);
                info!("dispatcher: interrupt released");
            }
            DispatchState::Polling => {
                self.poller.stop();
                info!("dispatcher: polling stopped");
            }
            DispatchState::Unregistered => debug!("dispatcher: nothing to tear down"),
        }
    }

    /// Mask or unmask the interrupt line
    ///
    /// Idempotent, and a no-op outside interrupt mode. Safe to call from
    /// the handler itself.
    pub fn set_interrupt_enabled(&self, enable: bool) {
        if self.mode() != Some(DispatchMode::Irq) {
            debug!("interrupt gate ignored outside interrupt mode");
            return;
        }
        if self.gate.set(&self.line, enable) {
            debug!("interrupt {}", if enable { "enabled" } else { "disabled" });
        }
    }

    /// Live mode, if registered
    pub fn mode(&self) -> Option<DispatchMode> {
        self.state.lock(|state| state.get().mode())
    }

    /// Whether the interrupt line is unmasked
    pub fn interrupt_enabled(&self) -> bool {
        self.gate.is_enabled()
    }

    /// Poll timer parameters used on fallback
    pub fn timing(&self) -> PollTiming {
        self.timing
    }

    /// Interrupt line handle
    pub fn line(&self) -> &L {
        &self.line
    }

    fn apply(&self, event: DispatchEvent) {
        self.state
            .lock(|state| state.set(state.get().transition(event)));
    }
}
