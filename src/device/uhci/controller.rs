//! Power-state machine of a UHCI host controller.
//!
//! The register protocol follows the UHCI Design Guide, revision 1.1,
//! section 2.1 ("USB I/O Registers"). All operations here block the
//! calling thread for the settle times the hardware mandates and must
//! not run concurrently for the same controller; the surrounding driver
//! serializes them.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, trace, warn, Level};

use crate::device::{
    delay::Delay,
    interrupt_line::{DummyInterruptGate, InterruptGate},
};

use super::{
    constants::{
        offset, timing, usbcmd, usbintr, usbsts, HALT_POLL_LIMIT, RESET_POLL_LIMIT,
        ROOT_HUB_PORTS,
    },
    errata::Errata,
    frame_list::FrameListAccess,
    registers::RegisterAccess,
    topology::{express_card_port, PortTopologyQuery},
};

/// The logical state of the USB bus behind the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    /// The controller processes the schedule.
    Running,

    /// The controller is stopped, globally suspended or dozing.
    Suspended,

    /// The controller is halted and is being, or needs to be, reset.
    Reset,
}

/// How the platform attached the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardType {
    /// Part of the chipset.
    BuiltIn,

    /// A plug-in card.
    Pci,
}

/// Errors reported by power transitions.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerError {
    /// The controller did not clear HCRESET in time.
    #[error("host controller did not acknowledge reset after {polls} polls")]
    ResetTimeout {
        /// How often HCRESET was polled.
        polls: u32,
    },
}

/// Static properties of a controller instance, known at attach time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// The quirks this controller needs.
    pub errata: Errata,

    /// Whether the platform reports the controller as built-in.
    pub built_in: bool,

    /// The number of root hub ports.
    pub num_ports: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            errata: Errata::empty(),
            built_in: false,
            num_ports: ROOT_HUB_PORTS,
        }
    }
}

/// The power-management state of one UHCI controller.
///
/// The handle owns the capabilities the driver supplied at attach time:
/// register access, the frame list and a way to block for settle times.
#[derive(Debug)]
pub struct ControllerHandle<R, F, D> {
    /// Access to the controller's registers.
    pub(super) regs: R,

    /// The frame list the controller fetches every frame.
    frame_list: F,

    /// Blocks for settle times and poll intervals.
    delay: D,

    /// Delivery of USB interrupts to the driver.
    interrupt_gate: Arc<dyn InterruptGate>,

    /// Quirks of this controller instance.
    pub(super) errata: Errata,

    num_ports: usize,

    bus_state: BusState,

    /// USBINTR contents to restore on the next interrupt enable.
    ///
    /// Non-zero only between disabling interrupts (or arming them after
    /// a reset) and enabling them again.
    saved_interrupts: u16,

    can_sleep: bool,

    card_type: CardType,

    /// The 1-based root hub port wired to an ExpressCard slot, 0 if none.
    pub(super) express_card_port: u32,

    /// A device was seen on the ExpressCard port.
    pub(super) express_card_device_attached: bool,

    /// Whether the controller's registers are accessible.
    pub(super) available: bool,
}

impl<R, F, D> ControllerHandle<R, F, D>
where
    R: RegisterAccess,
    F: FrameListAccess,
    D: Delay,
{
    /// Take control of an attached controller.
    ///
    /// This determines whether the controller can survive system sleep,
    /// looks for a root hub port wired to an ExpressCard slot in
    /// `topology` and derives the bus state from the command register.
    #[must_use]
    pub fn attach<Q: PortTopologyQuery>(
        regs: R,
        frame_list: F,
        delay: D,
        config: ControllerConfig,
        topology: &Q,
    ) -> Self {
        let (card_type, can_sleep) =
            if config.built_in && config.errata.contains(Errata::ICH6_POWER_SEQUENCING) {
                (CardType::BuiltIn, true)
            } else {
                (CardType::Pci, false)
            };

        let express_card_port = express_card_port(topology);
        if express_card_port != 0 {
            debug!(
                "ExpressCard slot on port {express_card_port}, registering for sleep notifications"
            );
        }

        let cmd = regs.io_read16(offset::USBCMD);
        let bus_state = if cmd & usbcmd::EGSM != 0 {
            BusState::Suspended
        } else if cmd & usbcmd::RS != 0 {
            BusState::Running
        } else {
            BusState::Reset
        };

        debug!(
            "attached controller: card type {card_type:?}, can sleep {can_sleep}, bus state {bus_state:?}"
        );

        Self {
            regs,
            frame_list,
            delay,
            interrupt_gate: Arc::new(DummyInterruptGate::default()),
            errata: config.errata,
            num_ports: config.num_ports,
            bus_state,
            saved_interrupts: 0,
            can_sleep,
            card_type,
            express_card_port,
            express_card_device_attached: false,
            available: true,
        }
    }

    /// Configure where USB interrupt enable/disable requests go.
    pub fn connect_interrupt_gate(&mut self, gate: Arc<dyn InterruptGate>) {
        self.interrupt_gate = gate;
    }

    /// The current bus state.
    #[must_use]
    pub const fn bus_state(&self) -> BusState {
        self.bus_state
    }

    /// Whether the controller keeps working across system sleep.
    #[must_use]
    pub const fn can_sleep(&self) -> bool {
        self.can_sleep
    }

    /// How the platform attached the controller.
    #[must_use]
    pub const fn card_type(&self) -> CardType {
        self.card_type
    }

    /// The 1-based root hub port wired to an ExpressCard slot, 0 if none.
    #[must_use]
    pub const fn express_card_port(&self) -> u32 {
        self.express_card_port
    }

    /// Record whether a device was seen on the ExpressCard port.
    pub fn set_express_card_device_attached(&mut self, attached: bool) {
        self.express_card_device_attached = attached;
    }

    /// Record whether the controller's registers are accessible.
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// The interrupt enable mask waiting to be restored.
    #[must_use]
    pub const fn saved_interrupts(&self) -> u16 {
        self.saved_interrupts
    }

    /// The frame list capability.
    #[must_use]
    pub const fn frame_list(&self) -> &F {
        &self.frame_list
    }

    /// Start or stop schedule processing.
    ///
    /// After changing Run/Stop, HCHalted is polled until it reflects the
    /// new state. A controller that does not follow is only logged.
    pub fn run(&mut self, run: bool) {
        let cmd = self.regs.io_read16(offset::USBCMD);
        let cmd = if run {
            cmd | usbcmd::RS
        } else {
            cmd & !usbcmd::RS
        };
        self.regs.io_write16(offset::USBCMD, cmd);

        for _ in 0..HALT_POLL_LIMIT {
            let halted = self.regs.io_read16(offset::USBSTS) & usbsts::HCH != 0;
            if halted != run {
                return;
            }
            self.delay.sleep_ms(timing::POLL_INTERVAL_MS);
        }

        warn!(
            "controller did not {} within {HALT_POLL_LIMIT} ms, status {:#x}",
            if run { "start" } else { "halt" },
            self.regs.io_read16(offset::USBSTS)
        );
    }

    /// Put the controller into global suspend.
    ///
    /// The controller is stopped, latched overcurrent indicators are
    /// cleared on controllers that implement them (a latched indicator
    /// blocks suspend), and global suspend is entered.
    pub fn suspend(&mut self) {
        debug!(
            "suspending controller, cmd {:#x}, status {:#x}",
            self.regs.io_read16(offset::USBCMD),
            self.regs.io_read16(offset::USBSTS)
        );

        self.run(false);

        for port in 0..self.num_ports {
            let status = self.regs.read_port_status(port);

            match (status.enabled(), status.suspended()) {
                (true, true) => debug!("port[{port}] is suspended {:#x}", status.raw()),
                (true, false) => {
                    debug!("port[{port}] is enabled but not suspended {:#x}", status.raw())
                }
                (false, _) => debug!("port[{port}] is not enabled {:#x}", status.raw()),
            }

            if self.errata.contains(Errata::SUPPORTS_OVERCURRENT) && status.overcurrent_latched()
            {
                warn!("port[{port}] had the overcurrent indicator set, clearing it");
                self.regs
                    .write_port_status(port, status.overcurrent_clear_value());
            }
        }

        let cmd = (self.regs.io_read16(offset::USBCMD) & !usbcmd::FGR) | usbcmd::EGSM;
        self.regs.io_write16(offset::USBCMD, cmd);
        self.bus_state = BusState::Suspended;

        self.delay.sleep_ms(timing::SUSPEND_SETTLE_MS);

        debug!(
            "suspend done, cmd {:#x}, status {:#x}",
            self.regs.io_read16(offset::USBCMD),
            self.regs.io_read16(offset::USBSTS)
        );
    }

    /// Bring the controller out of global suspend or a stop.
    ///
    /// Does nothing if the controller is already running. Otherwise the
    /// frame list is terminated, resume signalling is driven for the
    /// required time, configuration the controller may have lost is
    /// restored and the controller is started. The frame list is only
    /// released once devices had time to recover.
    pub fn resume(&mut self) {
        self.log_registers("+resume");

        let mut cmd = self.regs.io_read16(offset::USBCMD);
        if cmd & usbcmd::RS != 0 {
            debug!("controller already running, nothing to resume");
            return;
        }

        // Only SOFs may go out until devices recovered from resume.
        self.frame_list.set_all_terminate(true);

        if cmd & usbcmd::EGSM != 0 {
            debug!("controller is globally suspended, forcing resume");
            cmd |= usbcmd::FGR;
            self.regs.io_write16(offset::USBCMD, cmd);
            cmd = self.regs.io_read16(offset::USBCMD);
            debug!("after EGSM->FGR, cmd is {cmd:#x}");
        }

        // FGR is also set when a remote wakeup ended the suspend.
        if cmd & usbcmd::FGR != 0 {
            self.delay.sleep_ms(timing::RESUME_SIGNAL_MS);
            cmd &= !(usbcmd::FGR | usbcmd::EGSM);
            self.regs.io_write16(offset::USBCMD, cmd);
        }

        if cmd & (usbcmd::MAXP | usbcmd::CF) != usbcmd::MAXP | usbcmd::CF {
            debug!("marking MAXP and CF");
            cmd |= usbcmd::MAXP | usbcmd::CF;
            self.regs.io_write16(offset::USBCMD, cmd);
        }

        self.restore_frame_base();

        debug!("starting controller");
        self.run(true);
        self.bus_state = BusState::Running;

        self.delay.sleep_ms(timing::RESUME_RECOVERY_MS);

        self.frame_list.set_all_terminate(false);

        self.log_registers("-resume");
    }

    /// Reset the controller into a known state.
    ///
    /// Afterwards the controller is halted with its frame list base and
    /// configuration programmed, and interrupts disabled. Fails if the
    /// controller does not acknowledge the reset; there is no retry.
    pub fn reset_controller_state(&mut self) -> Result<(), ControllerError> {
        debug!("resetting controller");
        self.bus_state = BusState::Reset;

        self.regs.io_write16(offset::USBCMD, usbcmd::HCRESET);

        let mut polls = 0;
        while polls < RESET_POLL_LIMIT
            && self.regs.io_read16(offset::USBCMD) & usbcmd::HCRESET != 0
        {
            self.delay.sleep_ms(timing::POLL_INTERVAL_MS);
            polls += 1;
        }

        if polls >= RESET_POLL_LIMIT {
            error!("controller reset failed");
            return Err(ControllerError::ResetTimeout { polls });
        }
        debug!("reset done after {polls} polls");

        self.restore_frame_base();

        // 64-byte packets, and mark the controller as configured.
        self.regs
            .io_write16(offset::USBCMD, usbcmd::MAXP | usbcmd::CF);

        Ok(())
    }

    /// Start a controller after [`Self::reset_controller_state`].
    ///
    /// The full interrupt mask is armed for the next
    /// [`Self::enable_interrupts`] but not written to the controller yet.
    pub fn restart_controller_from_reset(&mut self) {
        debug!(
            "restarting from reset, bus state {:?}, cmd {:#x}, status {:#x}, frame base {:#x}",
            self.bus_state,
            self.regs.io_read16(offset::USBCMD),
            self.regs.io_read16(offset::USBSTS),
            self.regs.io_read32(offset::FRBASEADD)
        );

        self.run(true);
        self.bus_state = BusState::Running;

        self.saved_interrupts = usbintr::TIE | usbintr::RIE | usbintr::IOCE | usbintr::SPIE;
        debug!("armed interrupt mask {:#x}", self.saved_interrupts);
    }

    /// Mask all controller interrupts, remembering the current mask.
    pub fn disable_interrupts(&mut self) {
        self.saved_interrupts = self.regs.io_read16(offset::USBINTR);
        self.regs.io_write16(offset::USBINTR, 0);
        self.interrupt_gate.set_enabled(false);

        debug!(
            "interrupts disabled, saved mask {:#x}",
            self.saved_interrupts
        );
    }

    /// Restore the interrupt mask saved by [`Self::disable_interrupts`]
    /// or armed by [`Self::restart_controller_from_reset`].
    ///
    /// Without a preceding disable or restart this writes an empty mask.
    pub fn enable_interrupts(&mut self) {
        debug!(
            "enabling interrupts, USBINTR {:#x}, saved mask {:#x}",
            self.regs.io_read16(offset::USBINTR),
            self.saved_interrupts
        );

        self.regs
            .io_write16(offset::USBINTR, self.saved_interrupts);
        self.saved_interrupts = 0;
        self.interrupt_gate.set_enabled(true);
    }

    /// Stop the controller for idle power saving.
    ///
    /// Register contents survive doze, so nothing is saved.
    pub fn doze(&mut self) {
        self.log_registers("+doze");
        self.run(false);
        self.bus_state = BusState::Suspended;
    }

    /// Restart a controller stopped by [`Self::doze`].
    pub fn wake_from_doze(&mut self) {
        self.run(true);
        self.bus_state = BusState::Running;
        self.log_registers("-wake_from_doze");
    }

    /// Dump the controller registers when tracing is enabled.
    ///
    /// Register reads can have side effects, so nothing is read unless
    /// the dump is actually emitted.
    pub fn log_registers(&self, context: &str) {
        if !tracing::enabled!(Level::TRACE) {
            return;
        }

        let ports: Vec<String> = (0..self.num_ports)
            .map(|port| format!("{:#06x}", self.regs.read_port_status(port).raw()))
            .collect();

        trace!(
            "{context}: cmd {:#x}, status {:#x}, intr {:#x}, frnum {:#x}, frame base {:#x}, ports [{}]",
            self.regs.io_read16(offset::USBCMD),
            self.regs.io_read16(offset::USBSTS),
            self.regs.io_read16(offset::USBINTR),
            self.regs.io_read16(offset::FRNUM),
            self.regs.io_read32(offset::FRBASEADD),
            ports.join(", ")
        );
    }

    /// Reprogram FRBASEADD, which resets and deep sleep can clear.
    fn restore_frame_base(&mut self) {
        if let Some(address) = self.frame_list.physical_address() {
            debug!("setting frame base address {address:#x}");
            self.regs.io_write32(offset::FRBASEADD, address);
        }
    }
}
