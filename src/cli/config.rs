use anyhow::{bail, Result};
use clap::{Args, Subcommand};

use super::context::CliContext;
use super::output::OutputFormat;
use crate::config::get_value;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (default)
    Show,

    /// Print one value by dotted key, e.g. `engine.profile`
    Get {
        /// Configuration key
        key: String,
    },

    /// Print where the configuration file is looked up
    Path,
}

pub fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    match args.action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => {
            let source = if ctx.config_from_file() {
                ctx.config_path().display().to_string()
            } else {
                format!("defaults, {} not found", ctx.config_path().display())
            };
            match ctx.output() {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(ctx.config())?),
                OutputFormat::Human => {
                    println!("Effective configuration ({source}):");
                    print!("{}", serde_yaml::to_string(ctx.config())?);
                }
                OutputFormat::Yaml => print!("{}", serde_yaml::to_string(ctx.config())?),
            }
        }
        ConfigAction::Get { key } => match get_value(ctx.config(), &key)? {
            Some(value) => match ctx.output() {
                OutputFormat::Json => println!("{}", serde_json::to_string(&value)?),
                _ => print!("{}", serde_yaml::to_string(&value)?),
            },
            None => bail!("{} not found in configuration", key),
        },
        ConfigAction::Path => println!("{}", ctx.config_path().display()),
    }
    Ok(())
}
