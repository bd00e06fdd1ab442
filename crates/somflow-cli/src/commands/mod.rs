//! Command implementations

mod check;
mod config;
mod init;
mod inspect_config;
mod run;

use crate::cli::{Cli, Commands};
use crate::output::OutputWriter;
use anyhow::Result;
use somflow_core::config::{
    default_tools_dir, CliConfigOverrides, LayeredConfig, CONFIG_FILE_NAME,
};
use tokio_util::sync::CancellationToken;

/// Execute a CLI command
pub async fn execute(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let output = OutputWriter::new(cli.json);
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Run(args) => run::execute(args, &config, &output, cli.dry_run, &cancel).await,
        Commands::Init(args) => init::execute(args, &output, cli.dry_run),
        Commands::Check => check::execute(&config, &output).await,
        Commands::Config => config::execute(&config, &output),
        Commands::InspectConfig(args) => inspect_config::execute(args, &output),
    }
}

/// Resolve the tool configuration: defaults < file < environment < flags
fn load_config(cli: &Cli) -> Result<LayeredConfig> {
    let config = LayeredConfig::with_defaults(&default_tools_dir());
    let config = match &cli.config {
        Some(path) => config.load_from_file(path)?,
        None => config.load_optional_file(CONFIG_FILE_NAME)?,
    };

    let mut config = config.load_from_env();
    config.update_from_cli(CliConfigOverrides {
        tools_dir: cli.tools_dir.clone(),
        process_timeout_secs: cli.process_timeout,
    });
    Ok(config)
}
