//! # UHCI Power Management
//!
//! Power-state handling for Universal Host Controller Interface (UHCI)
//! USB 1.1 host controllers: global suspend and resume, controller
//! reset, idle doze, interrupt mask save/restore and the ExpressCard
//! wake quirk.
//!
//! A driver supplies its capabilities when attaching a
//! [`ControllerHandle`](controller::ControllerHandle):
//!
//! - [`RegisterAccess`](registers::RegisterAccess) for the I/O registers
//!   and configuration space,
//! - [`FrameListAccess`](frame_list::FrameListAccess) for the frame list,
//! - [`Delay`](crate::device::delay::Delay) to block for settle times,
//! - [`PortTopologyQuery`](topology::PortTopologyQuery) to find an
//!   ExpressCard port.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use uhci_pm::device::delay::ThreadSleep;
//! use uhci_pm::device::uhci::{
//!     controller::{BusState, ControllerConfig, ControllerHandle},
//!     emulated::{EmulatedConfigSpace, EmulatedUhci},
//!     frame_list::{FrameList, FrameListEntry},
//!     registers::BusRegisters,
//!     topology::NoTopology,
//! };
//!
//! let regs = BusRegisters::new(
//!     Arc::new(Mutex::new(EmulatedUhci::new(2))),
//!     Arc::new(Mutex::new(EmulatedConfigSpace::new())),
//! );
//! let frame_list = FrameList::new(FrameListEntry::from_raw(1), Some(0x1000));
//!
//! let mut controller = ControllerHandle::attach(
//!     regs,
//!     frame_list,
//!     ThreadSleep::default(),
//!     ControllerConfig::default(),
//!     &NoTopology::default(),
//! );
//!
//! controller.reset_controller_state().unwrap();
//! controller.restart_controller_from_reset();
//! controller.enable_interrupts();
//! assert_eq!(controller.bus_state(), BusState::Running);
//! ```

pub mod constants;
pub mod controller;
pub mod emulated;
pub mod errata;
pub mod frame_list;
pub mod power;
pub mod registers;
pub mod topology;

#[cfg(test)]
mod testing;
