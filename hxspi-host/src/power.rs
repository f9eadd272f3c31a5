//! GPIO power sequencing
//!
//! Bring-up: hold reset low, enable the 3V3 rail, let it settle, release
//! reset. Power-down reverses the order.

use std::thread;
use std::time::Duration;

use hxspi_hal::{OutputPin, PowerSequencer};
use log::{debug, warn};

/// Rail settle time before reset is released
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(2);

/// Power sequencing errors
#[derive(Debug, thiserror::Error)]
pub enum PowerError {
    #[error("failed to drive {0} line")]
    Pin(&'static str),
}

/// Reset and rail-enable sequencer
///
/// `reset` is active low. Boards without a switchable 3V3 rail pass
/// [`hxspi_hal::gpio::NoPin`] as `rail`.
pub struct GpioPowerSequencer<R: OutputPin, E: OutputPin> {
    reset: R,
    rail: E,
    settle: Duration,
    rail_on: bool,
}

impl<R: OutputPin, E: OutputPin> GpioPowerSequencer<R, E> {
    pub fn new(reset: R, rail: E) -> Self {
        Self {
            reset,
            rail,
            settle: DEFAULT_SETTLE,
            rail_on: false,
        }
    }

    /// Override the settle delay
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn is_rail_on(&self) -> bool {
        self.rail_on
    }

    fn bring_up(&mut self) -> Result<(), PowerError> {
        self.reset.set_low().map_err(|e| {
            warn!("reset low failed: {:?}", e);
            PowerError::Pin("reset")
        })?;

        self.rail.set_high().map_err(|e| {
            warn!("3V3 enable failed: {:?}", e);
            PowerError::Pin("3v3 enable")
        })?;
        self.rail_on = true;

        thread::sleep(self.settle);

        self.reset.set_high().map_err(|e| {
            warn!("reset release failed: {:?}", e);
            PowerError::Pin("reset")
        })
    }
}

impl<R: OutputPin, E: OutputPin> PowerSequencer for GpioPowerSequencer<R, E> {
    type Error = PowerError;

    fn power_up(&mut self) -> Result<(), PowerError> {
        let result = self.bring_up();
        if result.is_err() {
            self.power_down();
        } else {
            debug!("power up complete");
        }
        result
    }

    fn power_down(&mut self) {
        if let Err(e) = self.reset.set_low() {
            warn!("reset assert failed: {:?}", e);
        }
        if self.rail_on {
            if let Err(e) = self.rail.set_low() {
                warn!("3V3 disable failed: {:?}", e);
            }
            self.rail_on = false;
        }
        debug!("power down complete");
    }

    fn reset_assert(&mut self, asserted: bool) {
        if let Err(e) = self.reset.set_state(!asserted) {
            warn!("reset line failed: {:?}", e);
        }
    }
}
