use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::init_logging;
use crate::config::load_config;
use crate::metrics;

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    let loaded = load_config(cli.config.as_deref()).await;
    let json_logs = loaded
        .as_ref()
        .map(|loaded| loaded.config.logging.json)
        .unwrap_or(false);
    init_logging(&cli.log_level, cli.debug, json_logs)?;
    let loaded = match loaded {
        Ok(loaded) => loaded,
        Err(err) => {
            error!("Failed to load configuration: {:#}", err);
            return Err(err);
        }
    };
    let _metrics_server = metrics::spawn_metrics_server(cli.metrics_port);

    info!("Starting rne v{}", env!("CARGO_PKG_VERSION"));
    info!(
        path = %loaded.path.display(),
        from_file = loaded.from_file,
        profile = %loaded.config.engine.profile,
        "configuration ready"
    );
    let ctx = CliContext::new(loaded, cli.output);

    match dispatch(&cli, &ctx).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
