//! Idempotent interrupt gate
//!
//! Remembers whether the line is unmasked so repeated enable or disable
//! requests reach the platform at most once per change. The flag and the
//! platform call are updated under the same lock, so concurrent callers
//! cannot both observe the old value.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use hxspi_hal::IrqLine;

/// Enabled flag for one interrupt line
pub struct IrqGate<M: RawMutex> {
    enabled: Mutex<M, Cell<bool>>,
}

impl<M: RawMutex> IrqGate<M> {
    /// New gate in the given state
    pub const fn new(enabled: bool) -> Self {
        Self {
            enabled: Mutex::new(Cell::new(enabled)),
        }
    }

    /// Whether the line is currently unmasked
    pub fn is_enabled(&self) -> bool {
        self.enabled.lock(|flag| flag.get())
    }

    /// Record the line state without touching the platform
    ///
    /// Used when registration itself enables or releases the line.
    pub fn force(&self, enabled: bool) {
        self.enabled.lock(|flag| flag.set(enabled));
    }

    /// Move the line to `enable`; returns whether the platform was called
    pub fn set<L: IrqLine>(&self, line: &L, enable: bool) -> bool {
        self.enabled.lock(|flag| {
            if flag.get() == enable {
                return false;
            }
            if enable {
                line.enable();
            } else {
                line.disable_nosync();
            }
            flag.set(enable);
            true
        })
    }
}
