//! Polling scheduler abstraction
//!
//! Used when no interrupt line could be established: a periodic timer
//! queues a single work item onto a dedicated single-thread work queue.

use core::time::Duration;

use crate::irq::DataReadyHandler;

/// Timer parameters for polling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    /// Delay before the first tick
    pub initial_delay: Duration,
    /// Fixed interval between ticks
    pub period: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            period: Duration::from_secs(1),
        }
    }
}

/// Timer plus single-thread work queue
///
/// At most one work item is queued or running at a time: a tick that finds
/// the item still pending does not queue it twice.
pub trait PollScheduler {
    /// Error type for starting the scheduler
    type Error: core::fmt::Debug;

    /// Create the work queue and arm the timer
    fn start<H>(&self, timing: PollTiming, handler: H) -> Result<(), Self::Error>
    where
        H: DataReadyHandler + 'static;

    /// Cancel the timer, wait for any in-flight work item, destroy the queue
    ///
    /// Must be a no-op when the scheduler was never started.
    fn stop(&self);
}
