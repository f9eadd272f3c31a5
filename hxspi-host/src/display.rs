//! Display power notifications
//!
//! The panel's blank/unblank events drive touch suspend and resume. Which
//! events matter depends on the display stack the board uses, so there is
//! one variant per stack, picked from configuration.

use embassy_sync::blocking_mutex::raw::RawMutex;
use hxspi_core::{Device, Error};
use hxspi_hal::{IrqLine, PollScheduler, PowerSequencer, SpiBus};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Notification phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlankEvent {
    /// Sent before the panel changes state
    EarlyBlank,
    /// Sent after the panel changed state
    Blank,
}

/// Requested panel state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlankState {
    Unblank,
    Normal,
    VsyncSuspend,
    HsyncSuspend,
    Powerdown,
}

/// What a notification asks of the touch controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Suspend,
    Resume,
    Ignore,
}

/// Display stack delivering blank events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayNotifier {
    /// Legacy framebuffer notifier chain
    #[default]
    Framebuffer,
    /// DRM notifier chain
    Drm,
    /// DRM panel notifier
    DrmPanel,
}

impl DisplayNotifier {
    fn action(self, event: BlankEvent, blank: BlankState) -> Action {
        use BlankEvent::*;
        use BlankState::*;

        match self {
            DisplayNotifier::Framebuffer => match (event, blank) {
                (Blank, Unblank) => Action::Resume,
                (Blank, Powerdown | HsyncSuspend | VsyncSuspend | Normal) => Action::Suspend,
                _ => Action::Ignore,
            },
            DisplayNotifier::Drm | DisplayNotifier::DrmPanel => match (event, blank) {
                (EarlyBlank, Powerdown) => Action::Suspend,
                (Blank, Unblank) => Action::Resume,
                _ => Action::Ignore,
            },
        }
    }

    /// Forward one blank event to `device`
    ///
    /// Refused with [`Error::NotReady`] until the controller has booted, and
    /// for suspend or resume before the device is initialized.
    pub fn notify<M, B, L, P, S>(
        &self,
        device: &Device<M, B, L, P, S>,
        event: BlankEvent,
        blank: BlankState,
    ) -> Result<(), Error>
    where
        M: RawMutex,
        B: SpiBus,
        L: IrqLine,
        P: PollScheduler,
        S: PowerSequencer,
    {
        if !device.is_boot_done() {
            warn!("display notifier: controller still booting");
            return Err(Error::NotReady);
        }

        match self.action(event, blank) {
            Action::Suspend => {
                debug!("display {:?}: suspend", blank);
                device.suspend()
            }
            Action::Resume => {
                debug!("display {:?}: resume", blank);
                device.resume()
            }
            Action::Ignore => Ok(()),
        }
    }
}
