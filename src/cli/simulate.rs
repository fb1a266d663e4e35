use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use rne_profiles::PageProfile;
use tokio::fs;
use tracing::info;

use super::context::CliContext;
use crate::scenario::{self, Scenario};

#[derive(Args, Clone, Debug)]
pub struct SimulateArgs {
    /// Scenario file (YAML)
    #[arg(value_name = "FILE")]
    pub scenario: PathBuf,

    /// Page profile, overriding both the scenario and the configuration
    #[arg(long)]
    pub profile: Option<PageProfile>,
}

pub async fn cmd_simulate(args: SimulateArgs, ctx: &CliContext) -> Result<()> {
    let raw = fs::read_to_string(&args.scenario)
        .await
        .with_context(|| format!("reading {}", args.scenario.display()))?;
    let mut scenario = Scenario::from_yaml(&raw)
        .with_context(|| format!("loading {}", args.scenario.display()))?;
    if let Some(profile) = args.profile {
        scenario.profile = Some(profile);
    }

    info!(
        path = %args.scenario.display(),
        steps = scenario.steps.len(),
        "running scenario"
    );
    let report = scenario::run(&scenario, ctx.config())?;
    println!("{}", ctx.output().render(&report)?.trim_end());
    Ok(())
}
