//! This module implements the CLI interface.
//!
//! The binary drives an emulated UHCI controller through power
//! transitions. Every option describes either the emulated hardware or
//! the platform it is attached to.
use clap::{builder::RangedU64ValueParser, Parser, Subcommand, ValueEnum};

use uhci_pm::device::uhci::{
    constants::{MAX_ROOT_HUB_PORTS, ROOT_HUB_PORTS},
    emulated::ResetLatency,
    errata::Errata,
    topology::TopologyTree,
};

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None
)]
pub struct Cli {
    /// Enable verbose logging. Can be specified multiple times to
    /// increase verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Number of root hub ports of the controller.
    #[arg(
        long,
        default_value_t = ROOT_HUB_PORTS,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_ROOT_HUB_PORTS)
    )]
    pub ports: usize,

    /// Hardware quirks of the controller, separated by commas.
    #[arg(long, value_enum, value_delimiter = ',')]
    errata: Vec<ErrataArg>,

    /// The platform reports the controller as built into the chipset.
    #[arg(long)]
    pub built_in: bool,

    /// Location of an ejectable port node below the controller in the
    /// platform topology. This is how an ExpressCard slot shows up.
    ///
    /// Omit this option for a platform without ExpressCard slot.
    #[arg(long, value_name = "LOC")]
    express_card_location: Option<String>,

    /// A device was seen on the ExpressCard port before sleep.
    #[arg(long, requires = "express_card_location")]
    pub express_card_attached: bool,

    /// How many polls the controller takes to acknowledge a reset, or
    /// "never" for a controller that hangs in reset.
    #[arg(long, value_name = "POLLS", default_value = "2", value_parser = parse_reset_latency)]
    pub reset_latency: ResetLatency,

    /// Bus address of the frame list.
    #[arg(long, value_name = "ADDR", default_value = "0x10000", value_parser = parse_address)]
    pub frame_list_address: u32,

    /// The power transition to run after attaching and resetting the
    /// controller.
    #[command(subcommand)]
    pub scenario: Scenario,
}

/// Power transitions the binary can run.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Suspend for system sleep and resume again.
    SleepCycle {
        /// Drop the registers a controller loses in deep sleep before
        /// resuming.
        #[arg(long)]
        lose_power: bool,
    },

    /// Stop the controller for idle power saving and restart it.
    DozeCycle,

    /// Only reset and start the controller.
    Reset,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ErrataArg {
    /// Built-in controller with ICH6 power sequencing.
    Ich6PowerSequencing,
    /// USB_RES selects which ports can wake the system.
    PortResumeEnable,
    /// PORTSC implements the overcurrent indicator.
    Overcurrent,
}

impl From<ErrataArg> for Errata {
    fn from(arg: ErrataArg) -> Self {
        match arg {
            ErrataArg::Ich6PowerSequencing => Self::ICH6_POWER_SEQUENCING,
            ErrataArg::PortResumeEnable => Self::SUPPORTS_PORT_RESUME_ENABLE,
            ErrataArg::Overcurrent => Self::SUPPORTS_OVERCURRENT,
        }
    }
}

fn parse_reset_latency(value: &str) -> Result<ResetLatency, String> {
    if value == "never" {
        return Ok(ResetLatency::Never);
    }

    value
        .parse()
        .map(ResetLatency::Polls)
        .map_err(|e| format!("expected a poll count or \"never\": {e}"))
}

fn parse_address(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };

    parsed.map_err(|e| format!("invalid address: {e}"))
}

impl Cli {
    /// The combined errata set.
    pub fn errata(&self) -> Errata {
        self.errata
            .iter()
            .fold(Errata::empty(), |acc, &e| acc | Errata::from(e))
    }

    /// The platform topology below the controller.
    pub fn topology(&self) -> TopologyTree {
        let mut tree = TopologyTree::new("UHC1");
        let hub = tree.add_child(tree.root(), "RHUB", None, false);

        for port in 1..=self.ports {
            tree.add_child(hub, &format!("PRT{port}"), Some(port.to_string().as_str()), false);
        }

        if let Some(location) = &self.express_card_location {
            tree.add_child(hub, "EXPC", Some(location.as_str()), true);
        }

        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn errata_are_combined() {
        let cli = Cli::parse_from([
            "uhci-pm",
            "--errata",
            "overcurrent,port-resume-enable",
            "reset",
        ]);

        assert_eq!(
            cli.errata(),
            Errata::SUPPORTS_OVERCURRENT | Errata::SUPPORTS_PORT_RESUME_ENABLE
        );
    }

    #[test]
    fn reset_latency_accepts_never() {
        let cli = Cli::parse_from(["uhci-pm", "--reset-latency", "never", "reset"]);
        assert_eq!(cli.reset_latency, ResetLatency::Never);

        let cli = Cli::parse_from(["uhci-pm", "reset"]);
        assert_eq!(cli.reset_latency, ResetLatency::Polls(2));
    }

    #[test]
    fn addresses_accept_hex_and_decimal() {
        assert_eq!(parse_address("0x2000"), Ok(0x2000));
        assert_eq!(parse_address("4096"), Ok(4096));
        assert!(parse_address("0xzz").is_err());
    }

    #[test]
    fn port_count_must_fit_the_io_space() {
        let cli = Cli::parse_from(["uhci-pm", "--ports", "8", "reset"]);
        assert_eq!(cli.ports, 8);

        assert!(Cli::try_parse_from(["uhci-pm", "--ports", "9", "reset"]).is_err());
        assert!(Cli::try_parse_from(["uhci-pm", "--ports", "0", "reset"]).is_err());
    }

    #[test]
    fn sleep_cycle_takes_lose_power() {
        let cli = Cli::parse_from(["uhci-pm", "sleep-cycle", "--lose-power"]);
        assert_eq!(cli.scenario, Scenario::SleepCycle { lose_power: true });
    }
}
