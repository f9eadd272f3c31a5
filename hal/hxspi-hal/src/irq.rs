//! Interrupt line abstractions
//!
//! Mirrors a threaded interrupt: the platform owns the line and the
//! bottom-half thread, and calls the registered [`DataReadyHandler`] from
//! a context that may sleep.

/// Entry point invoked whenever the device is believed to have new data
///
/// Called from either the interrupt thread or the polling work queue,
/// never concurrently with itself for one device.
pub trait DataReadyHandler: Send + Sync {
    /// Service the device
    fn on_data_ready(&self);
}

impl<F> DataReadyHandler for F
where
    F: Fn() + Send + Sync,
{
    fn on_data_ready(&self) {
        self()
    }
}

/// Interrupt trigger condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Trigger {
    /// Fire once per high-to-low transition
    EdgeFalling,
    /// Fire while the line is held low
    LevelLow,
}

impl Trigger {
    /// Pick the trigger the device reports it needs
    pub fn for_device(edge_triggered: bool) -> Self {
        if edge_triggered {
            Trigger::EdgeFalling
        } else {
            Trigger::LevelLow
        }
    }
}

/// Threaded interrupt line
///
/// All methods take `&self`: the line is a shared handle, and masking
/// must be callable from the handler itself while it runs.
pub trait IrqLine {
    /// Error type for registration
    type Error: core::fmt::Debug;

    /// Whether a usable interrupt number was resolved for the device
    fn is_valid(&self) -> bool;

    /// Install `handler` as the threaded bottom half
    ///
    /// The line is enabled on success. The handler runs one-shot: the line
    /// stays masked until the handler returns.
    fn request<H>(&self, trigger: Trigger, handler: H) -> Result<(), Self::Error>
    where
        H: DataReadyHandler + 'static;

    /// Remove the handler, waiting for a running invocation to finish
    fn free(&self);

    /// Unmask the line
    fn enable(&self);

    /// Mask the line without waiting for a running handler
    fn disable_nosync(&self);

    /// Mark the line as a system wakeup source
    fn set_wake(&self, enable: bool) -> Result<(), Self::Error>;
}
