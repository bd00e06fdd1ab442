//! somflow CLI - Command-line interface
//!
//! Runs the SOM clustering workflow against a workspace and exposes the
//! supporting commands (workspace setup, environment check, configuration).

mod cli;
mod commands;
mod dry_run;
mod errors;
mod output;
mod output_types;
mod progress;

use clap::Parser;
use cli::Cli;
use errors::{CliError, EXIT_INVALID_INPUT, EXIT_SUCCESS, EXIT_UNEXPECTED};
use output::OutputWriter;
use tokio_util::sync::CancellationToken;

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Parse CLI arguments; usage errors are invalid input
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { EXIT_INVALID_INPUT } else { EXIT_SUCCESS });
        }
    };
    let json = cli.json;

    // Create async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            std::process::exit(EXIT_UNEXPECTED);
        }
    };

    // Execute the command
    let result = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping after the current stage");
                on_interrupt.cancel();
            }
        });

        commands::execute(cli, cancel).await
    });

    if let Err(err) = result {
        let error = match err.downcast::<CliError>() {
            Ok(error) => error,
            Err(err) => errors::from_anyhow(&err),
        };
        if json {
            OutputWriter::new(true).error_with_code(&error.message, error.exit_code);
        } else {
            error.display();
        }
        std::process::exit(error.exit_code);
    }
}
