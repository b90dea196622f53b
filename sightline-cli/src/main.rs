//! Sightline CLI - Command-line interface
//!
//! Resolves camera video sources and watches playback supervision from a
//! terminal.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use sightline_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "sightline")]
#[command(about = "Camera video source resolution and playback failover")]
struct Cli {
    /// Console log level
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    /// Directory for the full trace of the last run
    #[arg(long)]
    logs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    if let Err(e) = commands::handle_command(cli.command).await {
        tracing::error!("{}", e);
        anyhow::bail!(e.user_message());
    }

    Ok(())
}
