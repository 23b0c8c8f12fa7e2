//! # Controller Errata
//!
//! Individual UHCI implementations need different workarounds. The
//! surrounding driver identifies the silicon at attach time and hands the
//! resulting [`Errata`] set to the controller.

use bitflags::bitflags;

bitflags! {
    /// Hardware quirks of a specific controller instance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Errata: u32 {
        /// ICH6-style power sequencing. Built-in controllers with this
        /// erratum survive system sleep.
        const ICH6_POWER_SEQUENCING = 1 << 0;

        /// The controller has the USB_RES register in configuration space
        /// to choose which ports may wake the system.
        const SUPPORTS_PORT_RESUME_ENABLE = 1 << 1;

        /// The PORTSC registers implement the overcurrent indicator.
        /// A latched indicator prevents the controller from suspending.
        const SUPPORTS_OVERCURRENT = 1 << 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_errata_are_empty() {
        assert!(Errata::default().is_empty());
    }

    #[test]
    fn errata_combine() {
        let errata = Errata::SUPPORTS_OVERCURRENT | Errata::SUPPORTS_PORT_RESUME_ENABLE;

        assert!(errata.contains(Errata::SUPPORTS_OVERCURRENT));
        assert!(!errata.contains(Errata::ICH6_POWER_SEQUENCING));
    }
}
