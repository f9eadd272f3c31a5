//! GPIO pin abstractions
//!
//! The power sequencer drives two lines: an active-low reset output and
//! an optional 3V3 rail enable output. The interrupt input belongs to the
//! [`IrqLine`](crate::irq::IrqLine) implementation.

/// Digital output pin
///
/// Driving a line can fail on hosts where direction changes go through a
/// kernel interface, so every operation is fallible.
pub trait OutputPin {
    /// Error type for pin operations
    type Error: core::fmt::Debug;

    /// Set the pin high (logic 1)
    fn set_high(&mut self) -> Result<(), Self::Error>;

    /// Set the pin low (logic 0)
    fn set_low(&mut self) -> Result<(), Self::Error>;

    /// Set the pin to a specific state
    fn set_state(&mut self, high: bool) -> Result<(), Self::Error> {
        if high {
            self.set_high()
        } else {
            self.set_low()
        }
    }
}

/// Output pin that is not wired on this board
///
/// Lets a sequencer be built without, say, a 3V3 enable line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPin;

impl OutputPin for NoPin {
    type Error = core::convert::Infallible;

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
