//! # Emulated UHCI Register File
//!
//! A software model of the UHCI I/O registers and the power-management
//! part of its PCI configuration space. It honours the access semantics
//! the power-state code relies on (read/write, write-one-to-clear,
//! self-clearing reset, halted tracking) but does not execute any
//! schedule.
//!
//! Wrap the models in a [`std::sync::Mutex`] to obtain a
//! [`BusDevice`](crate::device::bus::BusDevice).

use tracing::trace;

use crate::device::bus::{Request, RequestSize, SingleThreadedBusDevice};

use super::constants::{
    config_space, frbaseadd, offset, portsc, usbcmd, usbintr, usbsts, IO_SPACE_SIZE,
};

/// A PORTSC register implementation supporting RW and RW1C bits.
///
/// Bits that are neither read/write nor write-one-to-clear are
/// read-only to software and only change through [`Self::latch`], which
/// models events on the wire.
#[derive(Debug, Clone)]
pub struct PortscRegister {
    value: u16,
    bitmask_rw: u16,
    bitmask_rw1c: u16,
}

impl PortscRegister {
    /// Create a new instance of the PORTSC register.
    ///
    /// # Parameters
    ///
    /// - initial_value: the initial value of the register.
    #[must_use]
    pub const fn new(initial_value: u16) -> Self {
        Self {
            value: initial_value,
            bitmask_rw: portsc::RW_BITS,
            bitmask_rw1c: portsc::W1C_BITS,
        }
    }

    /// Read the current register value.
    #[must_use]
    pub const fn read(&self) -> u16 {
        self.value | portsc::RESERVED_ONE
    }

    /// Update the current register value.
    ///
    /// RW bits take the written value, RW1C bits are cleared where the
    /// written value has a one. All other bits are read-only.
    pub const fn write(&mut self, new_value: u16) {
        let bits_to_clear = new_value & self.bitmask_rw1c;
        self.value &= !bits_to_clear;
        self.value = (self.value & !self.bitmask_rw) | (new_value & self.bitmask_rw);
    }

    /// Set bits as the port hardware would, e.g. on connect or
    /// overcurrent.
    pub const fn latch(&mut self, bits: u16) {
        self.value |= bits & portsc::MASK;
    }
}

/// How the emulated controller acknowledges a host controller reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetLatency {
    /// HCRESET reads back as set for this many reads of USBCMD.
    Polls(u32),

    /// HCRESET never clears.
    Never,
}

impl Default for ResetLatency {
    fn default() -> Self {
        Self::Polls(2)
    }
}

/// The emulated UHCI I/O register block.
#[derive(Debug, Clone)]
pub struct EmulatedUhci {
    usbcmd: u16,
    usbsts: u16,
    usbintr: u16,
    frnum: u16,
    frbaseadd: u32,
    sofmod: u8,
    ports: Vec<PortscRegister>,

    reset_latency: ResetLatency,

    /// The schedule keeps running after Run/Stop is cleared.
    stuck_schedule: bool,

    /// USBCMD reads left until a pending reset is acknowledged.
    reset_polls_left: Option<u32>,
}

impl EmulatedUhci {
    /// Create a halted controller with `num_ports` root hub ports.
    #[must_use]
    pub fn new(num_ports: usize) -> Self {
        Self {
            usbcmd: 0,
            usbsts: 0,
            usbintr: 0,
            frnum: 0,
            frbaseadd: 0,
            sofmod: 64,
            ports: vec![PortscRegister::new(0); num_ports],
            reset_latency: ResetLatency::default(),
            stuck_schedule: false,
            reset_polls_left: None,
        }
    }

    /// Configure how the controller acknowledges resets.
    #[must_use]
    pub fn with_reset_latency(mut self, latency: ResetLatency) -> Self {
        self.reset_latency = latency;
        self
    }

    /// Model a controller with a hung schedule that never halts when
    /// Run/Stop is cleared. Global suspend still halts it.
    #[must_use]
    pub const fn with_stuck_schedule(mut self) -> Self {
        self.stuck_schedule = true;
        self
    }

    /// The current USBCMD value, without side effects.
    #[must_use]
    pub const fn command(&self) -> u16 {
        self.usbcmd
    }

    /// Overwrite USBCMD without side effects, e.g. to model the state
    /// firmware left the controller in.
    pub const fn set_command(&mut self, value: u16) {
        self.usbcmd = value;
    }

    /// The current USBSTS value, without side effects.
    #[must_use]
    pub const fn status(&self) -> u16 {
        let stopped = self.usbcmd & usbcmd::RS == 0 && !self.stuck_schedule;
        let halted = stopped || self.usbcmd & usbcmd::EGSM != 0;

        if halted {
            self.usbsts | usbsts::HCH
        } else {
            self.usbsts & !usbsts::HCH
        }
    }

    /// The current USBINTR value.
    #[must_use]
    pub const fn interrupt_enable(&self) -> u16 {
        self.usbintr
    }

    /// The current FRBASEADD value.
    #[must_use]
    pub const fn frame_base(&self) -> u32 {
        self.frbaseadd
    }

    /// The current PORTSC value of `port` (0-based).
    #[must_use]
    pub fn port(&self, port: usize) -> u16 {
        self.ports[port].read()
    }

    /// Latch bits into a PORTSC register as the port hardware would.
    pub fn latch_port(&mut self, port: usize, bits: u16) {
        self.ports[port].latch(bits);
    }

    /// Drop the state a controller loses when its power well is turned
    /// off during deep sleep.
    pub const fn lose_power(&mut self) {
        self.frbaseadd = 0;
        self.usbcmd &= !(usbcmd::MAXP | usbcmd::CF);
    }

    fn start_reset(&mut self) {
        trace!("emulated controller reset");

        self.usbcmd = usbcmd::HCRESET;
        self.usbsts = 0;
        self.usbintr = 0;
        self.frnum = 0;
        self.frbaseadd = 0;
        self.sofmod = 64;
        for port in &mut self.ports {
            *port = PortscRegister::new(port.read() & portsc::CCS);
        }

        self.reset_polls_left = match self.reset_latency {
            ResetLatency::Polls(polls) => Some(polls),
            ResetLatency::Never => None,
        };
    }

    fn read_command(&mut self) -> u16 {
        if let Some(left) = self.reset_polls_left {
            if left == 0 {
                self.usbcmd &= !usbcmd::HCRESET;
                self.reset_polls_left = None;
            } else {
                self.reset_polls_left = Some(left - 1);
            }
        }

        self.usbcmd
    }

    fn port_index(&self, addr: u64) -> Option<usize> {
        let rel = addr.checked_sub(offset::PORTSC1)?;
        if rel % offset::PORTSC_STRIDE != 0 {
            return None;
        }

        let index = usize::try_from(rel / offset::PORTSC_STRIDE).ok()?;
        (index < self.ports.len()).then_some(index)
    }
}

impl SingleThreadedBusDevice for EmulatedUhci {
    fn size(&self) -> u64 {
        IO_SPACE_SIZE
    }

    fn read(&mut self, req: Request) -> u64 {
        let value: u64 = match req.addr {
            offset::USBCMD => self.read_command().into(),
            offset::USBSTS => self.status().into(),
            offset::USBINTR => self.usbintr.into(),
            offset::FRNUM => self.frnum.into(),
            offset::FRBASEADD => self.frbaseadd.into(),
            offset::SOFMOD => self.sofmod.into(),
            addr => match self.port_index(addr) {
                Some(port) => self.ports[port].read().into(),
                None => u64::MAX,
            },
        };

        value & req.size.value_mask()
    }

    fn write(&mut self, req: Request, value: u64) {
        let value = value & req.size.value_mask();

        match req.addr {
            offset::USBCMD => {
                let value = value as u16;

                if value & usbcmd::HCRESET != 0 {
                    self.start_reset();
                } else {
                    self.usbcmd = value & usbcmd::WRITABLE_BITS;
                }
            }
            offset::USBSTS => self.usbsts &= !(value as u16 & usbsts::W1C_BITS),
            offset::USBINTR => self.usbintr = value as u16 & usbintr::ALL,
            offset::FRNUM => self.frnum = value as u16 & 0x07FF,
            offset::FRBASEADD => self.frbaseadd = value as u32 & frbaseadd::ADDRESS_MASK,
            offset::SOFMOD => self.sofmod = value as u8 & 0x7F,
            addr => match self.port_index(addr) {
                Some(port) => self.ports[port].write(value as u16),
                None => trace!("ignoring write to unknown register {}", req),
            },
        }
    }
}

/// The emulated PCI configuration space of a UHCI function.
#[derive(Debug, Clone)]
pub struct EmulatedConfigSpace {
    bytes: [u8; config_space::SIZE as usize],
}

impl Default for EmulatedConfigSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulatedConfigSpace {
    /// Create a configuration space with wake enabled on all root hub
    /// ports.
    #[must_use]
    pub fn new() -> Self {
        let mut bytes = [0; config_space::SIZE as usize];
        bytes[config_space::USB_RES as usize] = config_space::USB_RES_PORT_MASK;

        Self { bytes }
    }

    /// The current value of the USB_RES register.
    #[must_use]
    pub const fn usb_res(&self) -> u8 {
        self.bytes[config_space::USB_RES as usize]
    }
}

impl SingleThreadedBusDevice for EmulatedConfigSpace {
    fn size(&self) -> u64 {
        config_space::SIZE
    }

    fn read(&mut self, req: Request) -> u64 {
        let len = u64::from(req.size);
        if req.addr + len > self.size() {
            return req.size.value_mask();
        }

        (0..len).rev().fold(0, |acc, i| {
            (acc << 8) | u64::from(self.bytes[(req.addr + i) as usize])
        })
    }

    fn write(&mut self, req: Request, value: u64) {
        let len = u64::from(req.size);
        if req.addr + len > self.size() {
            trace!("ignoring config space write out of range {}", req);
            return;
        }

        for i in 0..len {
            self.bytes[(req.addr + i) as usize] = (value >> (8 * i)) as u8;
        }
    }
}
