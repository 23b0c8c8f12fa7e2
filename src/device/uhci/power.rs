//! # Power Event Adapter
//!
//! Entry points the host power-management framework calls on a
//! controller. They forward into the state machine in
//! [`controller`](super::controller) and apply the ExpressCard wake
//! quirk on the way into system sleep.
//!
//! Pre- and post-change notifications only log. The transitions
//! themselves are driven by the driver lifecycle calling
//! [`ControllerHandle::save_controller_state_for_sleep`] and friends.

use tracing::{debug, trace};

use crate::device::delay::Delay;

use super::{
    constants::config_space,
    controller::{ControllerError, ControllerHandle},
    errata::Errata,
    frame_list::FrameListAccess,
    registers::RegisterAccess,
};

/// A platform function the platform calls on its drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformFunction<'a> {
    /// The system is about to sleep (`awake == false`) or has woken up.
    SetDebugDriverPowerState {
        /// Whether the system is awake.
        awake: bool,
    },

    /// Any other platform function, which is not handled here.
    Other(&'a str),
}

impl<R, F, D> ControllerHandle<R, F, D>
where
    R: RegisterAccess,
    F: FrameListAccess,
    D: Delay,
{
    /// Handle a platform function call.
    pub fn call_platform_function(
        &mut self,
        function: PlatformFunction<'_>,
    ) -> Result<(), ControllerError> {
        debug!("platform function {function:?}");

        match function {
            PlatformFunction::SetDebugDriverPowerState { awake: true } => {}
            PlatformFunction::SetDebugDriverPowerState { awake: false } => {
                self.mask_express_card_wake();
            }
            PlatformFunction::Other(name) => trace!("ignoring platform function {name}"),
        }

        Ok(())
    }

    /// Prepare the controller for system sleep.
    pub fn save_controller_state_for_sleep(&mut self) -> Result<(), ControllerError> {
        debug!("suspending controller for sleep");
        self.suspend();

        Ok(())
    }

    /// Bring the controller back after system sleep.
    pub fn restore_controller_state_from_sleep(&mut self) -> Result<(), ControllerError> {
        debug!("resuming controller from sleep");
        self.resume();

        Ok(())
    }

    /// The controller's power state is about to change to `new_state`.
    pub fn power_state_will_change_to(&mut self, new_state: u32) -> Result<(), ControllerError> {
        debug!("power state will change to {new_state}");
        self.log_registers("power_state_will_change_to");

        Ok(())
    }

    /// The controller's power state changed to `new_state`.
    pub fn power_state_did_change_to(&mut self, new_state: u32) -> Result<(), ControllerError> {
        debug!("power state did change to {new_state}");
        self.log_registers("power_state_did_change_to");

        Ok(())
    }

    /// A power change from `from_state` to `new_state` completed.
    pub fn power_change_done(&mut self, from_state: u32, new_state: u32) {
        if from_state == new_state {
            trace!(
                "power change done, stayed in state {new_state}, available {}",
                self.available
            );
        } else {
            debug!(
                "power change done from state {from_state} to state {new_state}, available {}",
                self.available
            );
        }

        if self.available {
            self.log_registers("power_change_done");
        }
    }

    /// Keep the ExpressCard port from waking the system.
    ///
    /// Some ExpressCard devices disconnect when the slot loses power in
    /// sleep. With wake on disconnect enabled for their port, that
    /// disconnect would wake the system right away.
    fn mask_express_card_wake(&mut self) {
        if !self.express_card_device_attached
            || self.express_card_port == 0
            || !self.errata.contains(Errata::SUPPORTS_PORT_RESUME_ENABLE)
        {
            return;
        }

        let port_bit = 1u8.checked_shl(self.express_card_port - 1).unwrap_or(0);
        let usb_res = config_space::USB_RES_PORT_MASK & !port_bit;

        debug!(
            "masking wake on ExpressCard port {}, USB_RES {usb_res:#x}",
            self.express_card_port
        );
        self.regs.config_write8(config_space::USB_RES, usb_res);
    }
}
