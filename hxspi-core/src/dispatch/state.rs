//! Dispatch state machine
//!
//! Tracks which notification path is live. The two modes are mutually
//! exclusive; teardown from either returns to `Unregistered`.

/// Active notification path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DispatchMode {
    /// Threaded interrupt on the data-ready line
    Irq,
    /// Periodic timer feeding a single-thread work queue
    Polling,
}

/// Dispatcher states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchState {
    /// No path established
    Unregistered,
    /// Interrupt handler installed
    Irq,
    /// Poll timer armed
    Polling,
}

/// Events driving the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchEvent {
    /// Interrupt registration succeeded
    IrqRegistered,
    /// Interrupt registration failed or was unavailable; polling armed
    PollingStarted,
    /// Registration attempt rolled back
    RegistrationFailed,
    /// Unregister requested
    TornDown,
}

impl DispatchState {
    /// Current mode, if any path is live
    pub fn mode(&self) -> Option<DispatchMode> {
        match self {
            DispatchState::Unregistered => None,
            DispatchState::Irq => Some(DispatchMode::Irq),
            DispatchState::Polling => Some(DispatchMode::Polling),
        }
    }

    /// Whether a path is live
    pub fn is_registered(&self) -> bool {
        !matches!(self, DispatchState::Unregistered)
    }

    /// Process an event and return the next state
    pub fn transition(self, event: DispatchEvent) -> Self {
        use DispatchEvent::*;
        use DispatchState::*;

        match (self, event) {
            (Unregistered, IrqRegistered) => Irq,
            (Unregistered, PollingStarted) => Polling,

            // IRQ is marked before the request; a failed request rolls back
            (Irq, RegistrationFailed) => Unregistered,
            (Irq, PollingStarted) => Polling,

            (Irq, TornDown) => Unregistered,
            (Polling, TornDown) => Unregistered,

            // Default: stay in current state
            _ => self,
        }
    }
}
