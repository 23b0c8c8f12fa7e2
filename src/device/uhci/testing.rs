//! Test doubles that record what the power-state code does to the
//! hardware, in order.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::device::{
    bus::{BusDevice, Request, RequestSize},
    delay::Delay,
};

use super::{
    constants::offset,
    controller::{ControllerConfig, ControllerHandle},
    emulated::{EmulatedConfigSpace, EmulatedUhci},
    frame_list::{FrameList, FrameListAccess, FrameListEntry},
    registers::{BusRegisters, RegisterAccess},
    topology::{NoTopology, PortTopologyQuery},
};

/// Where the test frame list pretends to live.
pub const FRAME_LIST_ADDRESS: u32 = 0x0004_2000;

/// A queue head pointer the test frame list entries link to.
const FRAME_LIST_LINK: u32 = 0x0004_3002;

/// One observable side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// USBCMD was written.
    Command(u16),
    /// USBINTR was written.
    InterruptEnable(u16),
    /// FRBASEADD was written.
    FrameBase(u32),
    /// A PORTSC register was written.
    PortWrite(usize, u16),
    /// Another I/O register was written.
    Io(u64, u32),
    /// A configuration space byte was written.
    Config(u64, u8),
    /// The terminate flag of all frame list entries was changed.
    Terminate(bool),
    /// The controller blocked for this many milliseconds.
    Sleep(u64),
}

type Trace = Arc<Mutex<Vec<Op>>>;

/// [`RegisterAccess`] that records every write before forwarding it.
#[derive(Debug)]
pub struct TracingRegisters {
    inner: BusRegisters,
    trace: Trace,
}

impl RegisterAccess for TracingRegisters {
    fn io_read16(&self, offset: u64) -> u16 {
        self.inner.io_read16(offset)
    }

    fn io_write16(&self, offset: u64, value: u16) {
        let op = match offset {
            offset::USBCMD => Op::Command(value),
            offset::USBINTR => Op::InterruptEnable(value),
            o if o >= offset::PORTSC1 => Op::PortWrite(
                ((o - offset::PORTSC1) / offset::PORTSC_STRIDE) as usize,
                value,
            ),
            o => Op::Io(o, value.into()),
        };
        self.trace.lock().unwrap().push(op);
        self.inner.io_write16(offset, value);
    }

    fn io_read32(&self, offset: u64) -> u32 {
        self.inner.io_read32(offset)
    }

    fn io_write32(&self, offset: u64, value: u32) {
        let op = match offset {
            offset::FRBASEADD => Op::FrameBase(value),
            o => Op::Io(o, value),
        };
        self.trace.lock().unwrap().push(op);
        self.inner.io_write32(offset, value);
    }

    fn config_read8(&self, offset: u64) -> u8 {
        self.inner.config_read8(offset)
    }

    fn config_write8(&self, offset: u64, value: u8) {
        self.trace.lock().unwrap().push(Op::Config(offset, value));
        self.inner.config_write8(offset, value);
    }
}

/// A [`FrameList`] that records terminate changes.
#[derive(Debug)]
pub struct TracingFrameList {
    inner: FrameList,
    trace: Trace,
}

impl TracingFrameList {
    pub fn inner(&self) -> &FrameList {
        &self.inner
    }
}

impl FrameListAccess for TracingFrameList {
    fn physical_address(&self) -> Option<u32> {
        self.inner.physical_address()
    }

    fn set_all_terminate(&mut self, terminate: bool) {
        self.trace.lock().unwrap().push(Op::Terminate(terminate));
        self.inner.set_all_terminate(terminate);
    }
}

/// A [`Delay`] that returns immediately and records the request.
#[derive(Debug)]
pub struct RecordingDelay {
    trace: Trace,
}

impl Delay for RecordingDelay {
    fn sleep_ms(&mut self, ms: u64) {
        self.trace.lock().unwrap().push(Op::Sleep(ms));
    }
}

pub type TestController = ControllerHandle<TracingRegisters, TracingFrameList, RecordingDelay>;

/// An emulated controller plus the trace of everything done to it.
#[derive(Debug)]
pub struct Fixture {
    hw: Arc<Mutex<EmulatedUhci>>,
    config: Arc<Mutex<EmulatedConfigSpace>>,
    trace: Trace,
}

impl Fixture {
    pub fn new(hw: EmulatedUhci) -> Self {
        Self {
            hw: Arc::new(Mutex::new(hw)),
            config: Arc::new(Mutex::new(EmulatedConfigSpace::new())),
            trace: Trace::default(),
        }
    }

    /// Attach a controller on a platform without topology information.
    pub fn controller(&self, config: ControllerConfig) -> TestController {
        self.controller_with_topology(config, &NoTopology::default())
    }

    pub fn controller_with_topology<Q: PortTopologyQuery>(
        &self,
        config: ControllerConfig,
        topology: &Q,
    ) -> TestController {
        let regs = TracingRegisters {
            inner: BusRegisters::new(self.hw.clone(), self.config.clone()),
            trace: self.trace.clone(),
        };
        let frame_list = TracingFrameList {
            inner: FrameList::new(
                FrameListEntry::from_raw(FRAME_LIST_LINK),
                Some(FRAME_LIST_ADDRESS),
            ),
            trace: self.trace.clone(),
        };
        let delay = RecordingDelay {
            trace: self.trace.clone(),
        };

        ControllerHandle::attach(regs, frame_list, delay, config, topology)
    }

    pub fn hw(&self) -> MutexGuard<'_, EmulatedUhci> {
        self.hw.lock().unwrap()
    }

    pub fn config_space(&self) -> MutexGuard<'_, EmulatedConfigSpace> {
        self.config.lock().unwrap()
    }

    /// Program USBINTR behind the controller's back.
    pub fn write_interrupt_enable(&self, mask: u16) {
        self.hw
            .write(Request::new(offset::USBINTR, RequestSize::Size2), mask.into());
    }

    pub fn ops(&self) -> Vec<Op> {
        self.trace.lock().unwrap().clone()
    }

    pub fn sleeps(&self) -> Vec<u64> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Sleep(ms) => Some(ms),
                _ => None,
            })
            .collect()
    }

    pub fn clear_trace(&self) {
        self.trace.lock().unwrap().clear();
    }
}
