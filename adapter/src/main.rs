use anyhow::{Context, Result};
use clap::Parser;

use mcp_adapter::cli::{Cli, Commands};
use mcp_adapter::config::AdapterConfig;
use mcp_adapter::handlers;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AdapterConfig::load_from_path(path)?,
        None => AdapterConfig::load().context("failed to load config")?,
    };
    if let Some(base_dir) = &cli.base_dir {
        config = config.with_base_dir(base_dir);
    }

    mcp_common::init_tracing("mcp_adapter", &cli.log_level(&config.log_level))?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let result = runtime.block_on(async move {
        match cli.command {
            Commands::Run(args) => handlers::run_server(config, args).await,
            Commands::Doctor => handlers::run_doctor(&config).await,
        }
    });
    // A blocked stdin read cannot be cancelled; don't wait for it
    runtime.shutdown_background();

    result
}
