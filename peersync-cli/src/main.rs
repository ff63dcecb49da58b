//! peersync -- BGP session audit and inventory sync.

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use clap::Parser;
use colored::Colorize;
use peersync_reconciler::RunMode;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let general = logging::resolve_general(&cli.config, cli.log_level.as_deref()).await;
    if let Err(e) = logging::init_tracing(&general) {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }

    let writer = OutputWriter::new(cli.output);
    if let Err(e) = dispatch(cli, &writer).await {
        tracing::error!(error = %e, exit_code = e.exit_code(), "command failed");
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

async fn dispatch(cli: Cli, writer: &OutputWriter) -> Result<(), CliError> {
    match cli.command {
        Commands::Audit(args) => {
            commands::run::execute(RunMode::Audit, args, &cli.config, writer).await
        }
        Commands::Sync(args) => {
            commands::run::execute(RunMode::Sync, args, &cli.config, writer).await
        }
        Commands::Parse(args) => commands::parse::execute(args, writer).await,
        Commands::Config(args) => commands::config::execute(args, &cli.config, writer).await,
    }
}
