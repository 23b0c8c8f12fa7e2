//! # Device Code
//!
//! This module contains the power-state code for UHCI host controllers
//! and the small abstractions it is built on. It should never depend on
//! operating system or hypervisor specific parts.

#![deny(missing_docs)]
#![deny(rustdoc::all)]
#![deny(clippy::must_use_candidate)]
#![deny(missing_debug_implementations)]

pub mod bus;
pub mod delay;
pub mod interrupt_line;
pub mod uhci;
