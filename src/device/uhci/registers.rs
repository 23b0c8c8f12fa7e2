//! # UHCI Register Interface
//!
//! Typed access to the UHCI I/O registers and the controller's PCI
//! configuration space. The state machine only ever talks to hardware
//! through [`RegisterAccess`].

use std::fmt::Debug;

use crate::device::bus::{BusDeviceRef, Request, RequestSize};

use super::constants::{offset, portsc};

/// Raw register access to a UHCI controller.
///
/// Accesses are never cached: every read goes to the hardware and
/// every write is issued immediately, in program order.
pub trait RegisterAccess: Debug {
    /// Read a 16-bit register at `offset` in the I/O space.
    fn io_read16(&self, offset: u64) -> u16;

    /// Write a 16-bit register at `offset` in the I/O space.
    fn io_write16(&self, offset: u64, value: u16);

    /// Read a 32-bit register at `offset` in the I/O space.
    fn io_read32(&self, offset: u64) -> u32;

    /// Write a 32-bit register at `offset` in the I/O space.
    fn io_write32(&self, offset: u64, value: u32);

    /// Read a byte from the PCI configuration space.
    fn config_read8(&self, offset: u64) -> u8;

    /// Write a byte to the PCI configuration space.
    fn config_write8(&self, offset: u64, value: u8);

    /// Read the PORTSC register of `port` (0-based).
    fn read_port_status(&self, port: usize) -> PortStatus {
        PortStatus::from_raw(self.io_read16(portsc_offset(port)))
    }

    /// Write the PORTSC register of `port` (0-based).
    ///
    /// The value is written as-is, so RW1C bits in `value` clear the
    /// matching change indicators and read/write bits take the given
    /// state.
    fn write_port_status(&self, port: usize, value: u16) {
        self.io_write16(portsc_offset(port), value);
    }
}

/// The I/O offset of the PORTSC register for `port` (0-based).
#[must_use]
pub const fn portsc_offset(port: usize) -> u64 {
    offset::PORTSC1 + offset::PORTSC_STRIDE * port as u64
}

/// [`RegisterAccess`] over two [`BusDevice`](crate::device::bus::BusDevice)s:
/// one for the I/O register block and one for PCI configuration space.
#[derive(Debug, Clone)]
pub struct BusRegisters {
    io: BusDeviceRef,
    config: BusDeviceRef,
}

impl BusRegisters {
    /// Create register access from the I/O block and configuration
    /// space of a controller.
    #[must_use]
    pub fn new(io: BusDeviceRef, config: BusDeviceRef) -> Self {
        Self { io, config }
    }
}

impl RegisterAccess for BusRegisters {
    fn io_read16(&self, offset: u64) -> u16 {
        self.io.read(Request::new(offset, RequestSize::Size2)) as u16
    }

    fn io_write16(&self, offset: u64, value: u16) {
        self.io
            .write(Request::new(offset, RequestSize::Size2), value.into());
    }

    fn io_read32(&self, offset: u64) -> u32 {
        self.io.read(Request::new(offset, RequestSize::Size4)) as u32
    }

    fn io_write32(&self, offset: u64, value: u32) {
        self.io
            .write(Request::new(offset, RequestSize::Size4), value.into());
    }

    fn config_read8(&self, offset: u64) -> u8 {
        self.config.read(Request::new(offset, RequestSize::Size1)) as u8
    }

    fn config_write8(&self, offset: u64, value: u8) {
        self.config
            .write(Request::new(offset, RequestSize::Size1), value.into());
    }
}

/// A snapshot of one PORTSC register.
///
/// Port state changes underneath the driver at any time, so a snapshot
/// is only meaningful for the operation that read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortStatus(u16);

impl PortStatus {
    /// Wrap a raw PORTSC value. Reserved bits are dropped.
    #[must_use]
    pub const fn from_raw(value: u16) -> Self {
        Self(value & portsc::MASK)
    }

    /// The raw register value.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Whether the port is enabled.
    #[must_use]
    pub const fn enabled(self) -> bool {
        self.0 & portsc::PED != 0
    }

    /// Whether the port is suspended.
    #[must_use]
    pub const fn suspended(self) -> bool {
        self.0 & portsc::SUSP != 0
    }

    /// Whether the latched overcurrent indicator is set.
    #[must_use]
    pub const fn overcurrent_latched(self) -> bool {
        self.0 & portsc::OCI != 0
    }

    /// Whether a device is connected.
    #[must_use]
    pub const fn connected(self) -> bool {
        self.0 & portsc::CCS != 0
    }

    /// The value to write back to clear only the latched overcurrent
    /// indicator.
    ///
    /// The read/write bits are carried over, so the write neither
    /// disables nor resumes the port, and the other change bits are left
    /// pending.
    #[must_use]
    pub const fn overcurrent_clear_value(self) -> u16 {
        (self.0 & portsc::RW_BITS) | portsc::OCI
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::device::uhci::emulated::{EmulatedConfigSpace, EmulatedUhci};

    #[test]
    fn port_status_decodes_bits() {
        let status = PortStatus::from_raw(portsc::PED | portsc::SUSP | portsc::CCS);

        assert!(status.enabled());
        assert!(status.suspended());
        assert!(status.connected());
        assert!(!status.overcurrent_latched());
    }

    #[test]
    fn port_status_drops_reserved_bits() {
        assert_eq!(PortStatus::from_raw(0xE000 | portsc::OCI).raw(), portsc::OCI);
    }

    #[test]
    fn overcurrent_clear_value_keeps_port_state() {
        let status =
            PortStatus::from_raw(portsc::PED | portsc::SUSP | portsc::OCI | portsc::CSC);

        assert_eq!(
            status.overcurrent_clear_value(),
            portsc::PED | portsc::SUSP | portsc::OCI,
            "only OCI may be written as one among the change bits"
        );
    }

    #[test]
    fn portsc_offsets_are_consecutive() {
        assert_eq!(portsc_offset(0), 0x10);
        assert_eq!(portsc_offset(1), 0x12);
    }

    #[test]
    fn bus_registers_reach_io_and_config_space() {
        let io = Arc::new(Mutex::new(EmulatedUhci::new(2)));
        let config = Arc::new(Mutex::new(EmulatedConfigSpace::new()));
        let regs = BusRegisters::new(io.clone(), config.clone());

        regs.io_write32(offset::FRBASEADD, 0x0012_3000);
        assert_eq!(regs.io_read32(offset::FRBASEADD), 0x0012_3000);

        regs.config_write8(0xC4, 0x01);
        assert_eq!(regs.config_read8(0xC4), 0x01);
        assert_eq!(config.lock().unwrap().usb_res(), 0x01);
    }
}
