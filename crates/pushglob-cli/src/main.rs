//! pushglob CLI
//!
//! Provides commands for:
//! - Planning and dispatching syncs of a space to a Globus endpoint
//! - Reconciling open transfer jobs, once or periodically
//! - Listing transfer jobs
//! - Probing endpoints
//! - Showing and validating the configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pushglob_core::config::{Config, CONFIG_ENV_VAR};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    auto::AutoCommand, config::ConfigCommand, status::StatusCommand, sync::SyncCommand,
    test::TestCommand, CliContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "pushglob",
    version,
    about = "Keep track of which local files have been pushed to Globus endpoints"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file [default: ~/.pushglob]
    #[arg(short, long, global = true, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a space and transfer its stale files to an endpoint
    Sync(SyncCommand),
    /// Check open transfer jobs and record their outcome
    Auto(AutoCommand),
    /// List transfer jobs
    Status(StatusCommand),
    /// Probe Globus endpoints
    Test(TestCommand),
    /// View and check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Picks the log filter: `RUST_LOG`, then `-v`, then `logging.level`
fn env_filter(verbose: u8, configured: Option<&str>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = match verbose {
        0 => configured.unwrap_or("warn"),
        1 => "debug",
        _ => "trace",
    };
    EnvFilter::new(level)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = CliContext::new(format, cli.config.unwrap_or_else(Config::default_path));

    // Logging level comes from the config when it can be read; commands
    // report config errors themselves
    let configured_level = Config::load(ctx.config_path())
        .ok()
        .map(|c| c.logging.level);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(cli.verbose, configured_level.as_deref()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Auto(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::Test(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    }
}
