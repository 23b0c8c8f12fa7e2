//! Power-state control for UHCI USB host controllers.

pub mod device;
