use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::info;

use uhci_pm::device::{
    delay::ThreadSleep,
    interrupt_line::LatchedInterruptGate,
    uhci::{
        controller::{ControllerConfig, ControllerHandle},
        emulated::{EmulatedConfigSpace, EmulatedUhci},
        frame_list::{FrameList, FrameListEntry},
        power::PlatformFunction,
        registers::BusRegisters,
    },
};

use crate::cli::{Cli, Scenario};

/// Power state ordinals as the host framework numbers them.
mod power_state {
    pub const SLEEP: u32 = 2;
    pub const ON: u32 = 4;
}

/// An emulated controller together with the power-state code driving it.
#[derive(Debug)]
pub struct SimulatedController {
    hw: Arc<Mutex<EmulatedUhci>>,
    config_space: Arc<Mutex<EmulatedConfigSpace>>,
    gate: Arc<LatchedInterruptGate>,
    controller: ControllerHandle<BusRegisters, FrameList, ThreadSleep>,
}

impl SimulatedController {
    /// Attach the power-state code to a fresh emulated controller.
    pub fn new(cli: &Cli) -> Self {
        let hw = Arc::new(Mutex::new(
            EmulatedUhci::new(cli.ports).with_reset_latency(cli.reset_latency),
        ));
        let config_space = Arc::new(Mutex::new(EmulatedConfigSpace::new()));
        let gate = Arc::new(LatchedInterruptGate::default());

        // The frame list starts out empty: every frame terminates.
        let frame_list = FrameList::new(
            FrameListEntry::from_raw(0).with_terminate(true),
            Some(cli.frame_list_address),
        );

        let mut controller = ControllerHandle::attach(
            BusRegisters::new(hw.clone(), config_space.clone()),
            frame_list,
            ThreadSleep::default(),
            ControllerConfig {
                errata: cli.errata(),
                built_in: cli.built_in,
                num_ports: cli.ports,
            },
            &cli.topology(),
        );
        controller.connect_interrupt_gate(gate.clone());
        controller.set_express_card_device_attached(cli.express_card_attached);

        Self {
            hw,
            config_space,
            gate,
            controller,
        }
    }

    /// Reset the controller and start it with interrupts enabled.
    pub fn start(&mut self) -> Result<()> {
        self.controller
            .reset_controller_state()
            .context("Failed to reset the host controller")?;
        self.controller.restart_controller_from_reset();
        self.controller.enable_interrupts();

        info!("controller running");
        Ok(())
    }

    /// Go through system sleep and back.
    pub fn sleep_cycle(&mut self, lose_power: bool) -> Result<()> {
        let controller = &mut self.controller;

        controller.disable_interrupts();
        controller
            .call_platform_function(PlatformFunction::SetDebugDriverPowerState { awake: false })
            .context("Failed to announce system sleep")?;
        controller
            .power_state_will_change_to(power_state::SLEEP)
            .context("Failed to prepare the power state change")?;
        controller
            .save_controller_state_for_sleep()
            .context("Failed to save controller state for sleep")?;
        controller.power_change_done(power_state::ON, power_state::SLEEP);
        info!(
            "controller suspended, can survive sleep: {}",
            controller.can_sleep()
        );

        if lose_power {
            info!("dropping controller power");
            self.hw.lock().unwrap().lose_power();
        }

        let controller = &mut self.controller;
        controller
            .call_platform_function(PlatformFunction::SetDebugDriverPowerState { awake: true })
            .context("Failed to announce system wake")?;
        controller
            .restore_controller_state_from_sleep()
            .context("Failed to restore controller state after sleep")?;
        controller
            .power_state_did_change_to(power_state::ON)
            .context("Failed to finish the power state change")?;
        controller.enable_interrupts();
        controller.power_change_done(power_state::SLEEP, power_state::ON);

        info!("controller resumed");
        Ok(())
    }

    /// Doze and wake up again.
    pub fn doze_cycle(&mut self) {
        self.controller.doze();
        info!("controller dozing");

        self.controller.wake_from_doze();
        info!("controller awake");
    }

    /// Log the final controller state.
    pub fn report(&self) {
        let hw = self.hw.lock().unwrap();

        info!(
            "bus state {:?}, cmd {:#06x}, status {:#06x}, intr {:#06x}, frame base {:#010x}, USB_RES {:#04x}, interrupts {}",
            self.controller.bus_state(),
            hw.command(),
            hw.status(),
            hw.interrupt_enable(),
            hw.frame_base(),
            self.config_space.lock().unwrap().usb_res(),
            if self.gate.is_enabled() { "on" } else { "off" },
        );
    }
}

/// Run the scenario selected on the command line.
pub fn run(cli: &Cli) -> Result<()> {
    let mut sim = SimulatedController::new(cli);
    info!(
        "attached controller, ExpressCard port {}",
        sim.controller.express_card_port()
    );

    sim.start()?;

    match cli.scenario {
        Scenario::SleepCycle { lose_power } => sim.sleep_cycle(lose_power)?,
        Scenario::DozeCycle => sim.doze_cycle(),
        Scenario::Reset => {}
    }

    sim.report();
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use uhci_pm::device::uhci::{
        constants::{config_space, usbcmd, usbintr},
        controller::BusState,
    };

    use super::*;

    fn sim(args: &[&str]) -> SimulatedController {
        let cli = Cli::parse_from(std::iter::once("uhci-pm").chain(args.iter().copied()));
        SimulatedController::new(&cli)
    }

    #[test]
    fn sleep_cycle_survives_power_loss() {
        let mut sim = sim(&["--frame-list-address", "0x20000", "sleep-cycle"]);

        sim.start().unwrap();
        sim.sleep_cycle(true).unwrap();

        let hw = sim.hw.lock().unwrap();
        assert_eq!(sim.controller.bus_state(), BusState::Running);
        assert_eq!(hw.frame_base(), 0x20000);
        assert_eq!(hw.command(), usbcmd::RS | usbcmd::MAXP | usbcmd::CF);
        assert_eq!(hw.interrupt_enable(), usbintr::ALL);
        assert!(sim.gate.is_enabled());
    }

    #[test]
    fn sleep_cycle_applies_express_card_quirk() {
        let mut sim = sim(&[
            "--errata",
            "port-resume-enable",
            "--express-card-location",
            "2",
            "--express-card-attached",
            "sleep-cycle",
        ]);

        sim.start().unwrap();
        sim.sleep_cycle(false).unwrap();

        assert_eq!(
            sim.config_space.lock().unwrap().usb_res(),
            config_space::USB_RES_PORT_MASK & !0b10
        );
    }

    #[test]
    fn doze_cycle_leaves_controller_running() {
        let mut sim = sim(&["doze-cycle"]);

        sim.start().unwrap();
        sim.doze_cycle();

        let hw = sim.hw.lock().unwrap();
        assert_eq!(sim.controller.bus_state(), BusState::Running);
        assert_eq!(hw.command(), usbcmd::RS | usbcmd::MAXP | usbcmd::CF);
        assert_eq!(hw.interrupt_enable(), usbintr::ALL);
    }

    #[test]
    fn stuck_reset_fails_start() {
        let mut sim = sim(&["--reset-latency", "never", "reset"]);

        let err = sim.start().unwrap_err();
        assert!(err.to_string().contains("Failed to reset"));
    }
}
