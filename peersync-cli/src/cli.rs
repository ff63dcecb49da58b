//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no I/O happens here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use peersync_core::types::Dialect;

/// peersync -- BGP session audit against the network inventory.
///
/// Use `peersync <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "peersync", version, about, long_about = None)]
pub struct Cli {
    /// Path to the peersync.toml configuration file.
    #[arg(short, long, global = true, default_value = "peersync.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare router sessions with the inventory and write the report.
    Audit(RunArgs),

    /// Audit, then create or update inventory sessions to match the routers.
    Sync(RunArgs),

    /// Parse a saved BGP summary capture without contacting anything.
    Parse(ParseArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- audit / sync ----

/// Options shared by `audit` and `sync`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Override the report file path.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Only process these routers (repeatable). Default: every configured router.
    #[arg(long = "router")]
    pub routers: Vec<String>,

    /// Override the number of routers processed concurrently.
    #[arg(long)]
    pub concurrency: Option<usize>,
}

// ---- parse ----

/// Parse a captured `show ... bgp summary` output.
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Output dialect (cisco_ios, cisco_xr, nokia_sros).
    #[arg(long, value_parser = parse_dialect)]
    pub dialect: Dialect,

    /// Router hostname recorded on each observation.
    #[arg(long, default_value = "-")]
    pub router: String,

    /// File holding the raw command output.
    pub file: PathBuf,
}

fn parse_dialect(s: &str) -> Result<Dialect, String> {
    Dialect::from_name(s).ok_or_else(|| {
        let known: Vec<&str> = Dialect::ALL.iter().map(|d| d.name()).collect();
        format!("unknown dialect '{s}' (expected: {})", known.join(", "))
    })
}

// ---- config ----

/// Manage peersync configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only one section (general, inventory, device, retry, reconcile, report, routers).
        #[arg(long)]
        section: Option<String>,
    },
}
