use anyhow::Result;

use super::commands::Commands;
use super::config::cmd_config;
use super::env::CliArgs;
use super::info::cmd_info;
use super::profiles::cmd_profiles;
use super::context::CliContext;
use super::simulate::cmd_simulate;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Simulate(args) => cmd_simulate(args, ctx).await,
        Commands::Profiles => cmd_profiles(ctx),
        Commands::Config(args) => cmd_config(args, ctx),
        Commands::Info => cmd_info(ctx),
    }
}
