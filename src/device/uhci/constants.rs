//! # UHCI Constants
//!
//! This module collects UHCI related constants. Register layouts follow
//! the "Universal Host Controller Interface (UHCI) Design Guide",
//! revision 1.1, and the Intel I/O controller hub datasheets for the
//! PCI configuration registers.

// Allow missing docs to avoid duplicating the UHCI design guide for all constants.
#![allow(missing_docs)]

/// Offsets of the registers in the UHCI I/O space.
pub mod offset {
    pub const USBCMD: u64 = 0x00;
    pub const USBSTS: u64 = 0x02;
    pub const USBINTR: u64 = 0x04;
    pub const FRNUM: u64 = 0x06;
    pub const FRBASEADD: u64 = 0x08;
    pub const SOFMOD: u64 = 0x0C;
    pub const PORTSC1: u64 = 0x10;

    /// Distance between consecutive PORTSC registers.
    pub const PORTSC_STRIDE: u64 = 2;
}

/// The size of the UHCI I/O space in bytes.
pub const IO_SPACE_SIZE: u64 = 0x20;

/// The number of ports a UHCI root hub exposes.
pub const ROOT_HUB_PORTS: usize = 2;

/// The most PORTSC registers that fit into the I/O space.
pub const MAX_ROOT_HUB_PORTS: u64 = (IO_SPACE_SIZE - offset::PORTSC1) / offset::PORTSC_STRIDE;

/// USB Command Register (USBCMD).
pub mod usbcmd {
    /// Run/Stop.
    pub const RS: u16 = 1 << 0;
    /// Host Controller Reset. Self-clearing once the reset completed.
    pub const HCRESET: u16 = 1 << 1;
    /// Global Reset.
    pub const GRESET: u16 = 1 << 2;
    /// Enter Global Suspend Mode.
    pub const EGSM: u16 = 1 << 3;
    /// Force Global Resume.
    pub const FGR: u16 = 1 << 4;
    /// Software Debug.
    pub const SWDBG: u16 = 1 << 5;
    /// Configure Flag.
    pub const CF: u16 = 1 << 6;
    /// Max Packet (1 = 64 bytes).
    pub const MAXP: u16 = 1 << 7;

    pub const WRITABLE_BITS: u16 = RS | GRESET | EGSM | FGR | SWDBG | CF | MAXP;
}

/// USB Status Register (USBSTS).
pub mod usbsts {
    pub const USBINT: u16 = 1 << 0;
    pub const USBERRINT: u16 = 1 << 1;
    pub const RESUME_DETECT: u16 = 1 << 2;
    pub const HSE: u16 = 1 << 3;
    pub const HC_PROCESS_ERROR: u16 = 1 << 4;
    /// HC Halted.
    pub const HCH: u16 = 1 << 5;

    pub const W1C_BITS: u16 = USBINT | USBERRINT | RESUME_DETECT | HSE | HC_PROCESS_ERROR;
}

/// USB Interrupt Enable Register (USBINTR).
pub mod usbintr {
    /// Timeout/CRC interrupt enable.
    pub const TIE: u16 = 1 << 0;
    /// Resume interrupt enable.
    pub const RIE: u16 = 1 << 1;
    /// Interrupt on complete enable.
    pub const IOCE: u16 = 1 << 2;
    /// Short packet interrupt enable.
    pub const SPIE: u16 = 1 << 3;

    pub const ALL: u16 = TIE | RIE | IOCE | SPIE;
}

/// Frame List Base Address Register (FRBASEADD).
pub mod frbaseadd {
    /// The frame list must be aligned to a 4 KiB boundary.
    pub const ADDRESS_MASK: u32 = 0xFFFF_F000;
}

/// Port Status and Control Register (PORTSC).
pub mod portsc {
    /// Current Connect Status.
    pub const CCS: u16 = 1 << 0;
    /// Connect Status Change.
    pub const CSC: u16 = 1 << 1;
    /// Port Enabled/Disabled.
    pub const PED: u16 = 1 << 2;
    /// Port Enable/Disable Change.
    pub const PEDC: u16 = 1 << 3;
    pub const LINE_STATUS: u16 = 0b11 << 4;
    /// Resume Detect.
    pub const RD: u16 = 1 << 6;
    /// Reserved, always reads as one.
    pub const RESERVED_ONE: u16 = 1 << 7;
    /// Low Speed Device Attached.
    pub const LSDA: u16 = 1 << 8;
    /// Port Reset.
    pub const PR: u16 = 1 << 9;
    /// Overcurrent Active.
    pub const OCA: u16 = 1 << 10;
    /// Overcurrent Indicator, latched until written with one.
    pub const OCI: u16 = 1 << 11;
    /// Suspend.
    pub const SUSP: u16 = 1 << 12;

    /// The bits carrying port state. Everything above is reserved.
    pub const MASK: u16 = 0x1FFF;

    pub const RW_BITS: u16 = PED | RD | PR | SUSP;
    pub const W1C_BITS: u16 = CSC | PEDC | OCI;
}

/// Frame list constants.
pub mod frame_list {
    /// The number of entries in the frame list.
    pub const ENTRIES: usize = 1024;

    /// Terminate bit of a frame list pointer.
    pub const TERMINATE: u32 = 1 << 0;
}

/// PCI configuration space registers used for power management.
pub mod config_space {
    /// The config space size of a single PCI function in bytes.
    pub const SIZE: u64 = 256;

    /// USB Resume Enable register (USB_RES).
    ///
    /// Each of the two low bits enables wake on connect/disconnect for
    /// the matching root hub port while the system sleeps.
    pub const USB_RES: u64 = 0xC4;

    /// All port wake bits of `USB_RES`.
    pub const USB_RES_PORT_MASK: u8 = 0x03;
}

/// Fixed timings in milliseconds.
pub mod timing {
    /// Settle time after entering global suspend.
    pub const SUSPEND_SETTLE_MS: u64 = 3;
    /// How long Force Global Resume has to be driven.
    pub const RESUME_SIGNAL_MS: u64 = 20;
    /// Recovery time for devices after the controller runs again.
    pub const RESUME_RECOVERY_MS: u64 = 10;
    /// Interval between polls of a controller register.
    pub const POLL_INTERVAL_MS: u64 = 1;
}

/// Upper bound on polls of HCRESET before a reset counts as failed.
pub const RESET_POLL_LIMIT: u32 = 100;

/// Upper bound on polls of HCH after changing Run/Stop.
pub const HALT_POLL_LIMIT: u32 = 20;
