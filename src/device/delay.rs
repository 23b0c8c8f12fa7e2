//! # Blocking Delays
//!
//! UHCI power transitions are paced by settle times the hardware
//! mandates (resume signalling, suspend entry, device recovery). These
//! are fixed blocking waits, not polled conditions, and they are never
//! cancelled. The [`Delay`] trait lets the surrounding driver decide
//! how the calling thread blocks.

use std::fmt::Debug;
use std::thread;
use std::time::Duration;

/// Blocks the calling thread for a fixed time.
pub trait Delay: Debug {
    /// Block for at least `ms` milliseconds.
    ///
    /// Nothing sequenced after the call may execute before the time has
    /// elapsed.
    fn sleep_ms(&mut self, ms: u64);
}

/// A [`Delay`] that parks the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleep {}

impl Delay for ThreadSleep {
    fn sleep_ms(&mut self, ms: u64) {
        thread::sleep(Duration::from_millis(ms));
    }
}
