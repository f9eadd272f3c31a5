//! Polling work queue
//!
//! A timer thread ticks at a fixed period and queues the work item; a
//! single worker thread runs it. A tick that finds the item still queued
//! is coalesced, so at most one item is queued or running at any time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use hxspi_hal::{DataReadyHandler, PollScheduler, PollTiming};
use log::{debug, warn};

/// Poller errors
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("poller already started")]
    AlreadyStarted,
    #[error("poll period must be non-zero")]
    ZeroPeriod,
    #[error("failed to spawn poll thread")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Default)]
struct QueueState {
    queued: bool,
    running: bool,
    stopping: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<QueueState>,
    cond: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Counters that outlive a start/stop cycle
#[derive(Debug, Default)]
pub struct PollStats {
    ticks: AtomicUsize,
    coalesced: AtomicUsize,
    completed: AtomicUsize,
}

impl PollStats {
    /// Timer expirations
    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Ticks that found the item already queued
    pub fn coalesced(&self) -> usize {
        self.coalesced.load(Ordering::SeqCst)
    }

    /// Work items that ran to completion
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

struct Running {
    shared: Arc<Shared>,
    timer: JoinHandle<()>,
    worker: JoinHandle<()>,
}

/// Timer plus single-thread work queue
#[derive(Default)]
pub struct WorkQueuePoller {
    running: Mutex<Option<Running>>,
    stats: Arc<PollStats>,
}

impl WorkQueuePoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared counters, valid across restarts
    pub fn stats(&self) -> Arc<PollStats> {
        self.stats.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|running| running.is_some())
            .unwrap_or(false)
    }

    fn tick(shared: Arc<Shared>, stats: Arc<PollStats>, timing: PollTiming) {
        let mut deadline = Instant::now() + timing.initial_delay;
        let mut state = shared.lock();
        loop {
            let now = Instant::now();
            if now < deadline {
                state = shared
                    .cond
                    .wait_timeout(state, deadline - now)
                    .map(|(guard, _)| guard)
                    .unwrap_or_else(|e| e.into_inner().0);
                if state.stopping {
                    break;
                }
                continue;
            }
            if state.stopping {
                break;
            }

            stats.ticks.fetch_add(1, Ordering::SeqCst);
            if state.queued {
                stats.coalesced.fetch_add(1, Ordering::SeqCst);
            } else {
                state.queued = true;
                shared.cond.notify_all();
            }
            // Fixed period, measured from the previous deadline
            deadline += timing.period;
        }
        debug!("poll timer exiting");
    }

    fn work<H: DataReadyHandler>(shared: Arc<Shared>, stats: Arc<PollStats>, handler: H) {
        let mut state = shared.lock();
        loop {
            while !state.queued && !state.stopping {
                state = shared.cond.wait(state).unwrap_or_else(|e| e.into_inner());
            }
            if state.stopping {
                // Cancel a queued item that has not started
                state.queued = false;
                break;
            }

            state.queued = false;
            state.running = true;
            drop(state);

            handler.on_data_ready();
            stats.completed.fetch_add(1, Ordering::SeqCst);

            state = shared.lock();
            state.running = false;
            shared.cond.notify_all();
        }
        debug!("poll worker exiting");
    }
}

impl PollScheduler for WorkQueuePoller {
    type Error = PollError;

    fn start<H>(&self, timing: PollTiming, handler: H) -> Result<(), PollError>
    where
        H: DataReadyHandler + 'static,
    {
        if timing.period.is_zero() {
            warn!("refusing to poll with a zero period");
            return Err(PollError::ZeroPeriod);
        }
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.is_some() {
            return Err(PollError::AlreadyStarted);
        }

        let shared = Arc::new(Shared::default());

        let worker = {
            let (shared, stats) = (shared.clone(), self.stats.clone());
            thread::Builder::new()
                .name("hxspi-poll-wq".into())
                .spawn(move || Self::work(shared, stats, handler))?
        };

        let timer = {
            let (timer_shared, stats) = (shared.clone(), self.stats.clone());
            match thread::Builder::new()
                .name("hxspi-poll-timer".into())
                .spawn(move || Self::tick(timer_shared, stats, timing))
            {
                Ok(timer) => timer,
                Err(e) => {
                    // Worker is already up; take it down before reporting
                    shared.lock().stopping = true;
                    shared.cond.notify_all();
                    let _ = worker.join();
                    return Err(e.into());
                }
            }
        };

        *running = Some(Running {
            shared,
            timer,
            worker,
        });
        debug!(
            "polling every {:?} after {:?}",
            timing.period, timing.initial_delay
        );
        Ok(())
    }

    fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(running) = running else {
            return;
        };

        {
            let mut state = running.shared.lock();
            state.stopping = true;
            running.shared.cond.notify_all();
        }

        if running.timer.join().is_err() {
            warn!("poll timer panicked");
        }
        // Stopping from the work item itself: it exits on return
        if running.worker.thread().id() == thread::current().id() {
            return;
        }
        if running.worker.join().is_err() {
            warn!("poll worker panicked");
        }
    }
}

impl Drop for WorkQueuePoller {
    fn drop(&mut self) {
        self.stop();
    }
}
