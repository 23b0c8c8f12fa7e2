//! # Interrupt Gate
//!
//! This module exposes an abstract [`InterruptGate`] trait, which is
//! supposed to be implemented by whatever delivers the controller's
//! interrupts to its driver (an interrupt event source, a workloop, or a
//! test double). The power-state code uses it to turn USB interrupt
//! delivery on and off without any knowledge about the receiver.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};

/// An interrupt gate with a single operation: [`InterruptGate::set_enabled`].
pub trait InterruptGate: Debug + Send + Sync + 'static {
    /// Enable or disable delivery of USB interrupts to the driver.
    fn set_enabled(&self, enabled: bool);
}

/// A dummy interrupt gate that is intended to be used by controllers
/// whose interrupts aren't wired to any receiver.
#[derive(Default, Debug, Clone, Copy)]
pub struct DummyInterruptGate {}

impl InterruptGate for DummyInterruptGate {
    fn set_enabled(&self, _enabled: bool) {}
}

/// An interrupt gate that only remembers its last setting.
///
/// Useful where the consumer polls for interrupts instead of being
/// called back.
#[derive(Default, Debug)]
pub struct LatchedInterruptGate {
    enabled: AtomicBool,
}

impl LatchedInterruptGate {
    /// Whether interrupt delivery is currently enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

impl InterruptGate for LatchedInterruptGate {
    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latched_gate_starts_disabled_and_follows_writes() {
        let gate = LatchedInterruptGate::default();
        assert!(!gate.is_enabled());

        gate.set_enabled(true);
        assert!(gate.is_enabled());

        gate.set_enabled(false);
        assert!(!gate.is_enabled());
    }
}
