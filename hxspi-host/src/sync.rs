//! Per-instance blocking lock for host devices
//!
//! `CriticalSectionRawMutex` over the `std` critical-section backend is
//! one process-wide lock, so every `Mutex<M, _>` in every device would
//! serialize against every other. [`StdRawMutex`] gives each blocking
//! mutex its own lock: the bus lock of one device never waits on its
//! interrupt gate, its flags or another device's bus.
//!
//! Locking is reentrant on the owning thread, as the `RawMutex` contract
//! allows.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use embassy_sync::blocking_mutex::raw::RawMutex;

#[derive(Debug)]
struct Owner {
    thread: Option<ThreadId>,
    depth: usize,
}

/// Reentrant raw mutex backed by `std::sync`
#[derive(Debug)]
pub struct StdRawMutex {
    owner: Mutex<Owner>,
    released: Condvar,
}

impl StdRawMutex {
    pub const fn new() -> Self {
        Self {
            owner: Mutex::new(Owner {
                thread: None,
                depth: 0,
            }),
            released: Condvar::new(),
        }
    }

    fn owner(&self) -> MutexGuard<'_, Owner> {
        self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self) {
        let me = thread::current().id();
        let mut owner = self.owner();
        loop {
            match owner.thread {
                None => {
                    owner.thread = Some(me);
                    owner.depth = 1;
                    return;
                }
                Some(thread) if thread == me => {
                    owner.depth += 1;
                    return;
                }
                Some(_) => {
                    owner = self
                        .released
                        .wait(owner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    fn release(&self) {
        let mut owner = self.owner();
        owner.depth -= 1;
        if owner.depth == 0 {
            owner.thread = None;
            drop(owner);
            self.released.notify_one();
        }
    }
}

impl Default for StdRawMutex {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases on scope exit, unwinding included
struct Held<'a>(&'a StdRawMutex);

impl Drop for Held<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

// SAFETY: `acquire` admits a thread only when no other thread owns the
// lock, and ownership is given up only when that thread's outermost
// `lock` call returns or unwinds.
unsafe impl RawMutex for StdRawMutex {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    fn lock<R>(&self, f: impl FnOnce() -> R) -> R {
        self.acquire();
        let _held = Held(self);
        f()
    }
}
