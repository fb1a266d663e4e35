use clap::Subcommand;

use super::config::ConfigArgs;
use super::simulate::SimulateArgs;

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Run a scripted page session against the engine
    Simulate(SimulateArgs),

    /// List page profiles and their descriptors
    Profiles,

    /// Show the effective configuration
    Config(ConfigArgs),

    /// Show version and build information
    Info,
}
