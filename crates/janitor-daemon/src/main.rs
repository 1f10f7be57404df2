//! Analytics datastore janitor
//!
//! Runs bulk maintenance against the analytics datastore.
//!
//! # Usage
//!
//! ```bash
//! janitor clean-all [--remove-ips]
//! janitor clean-older-than --before "2024-01-01 00:00:00"
//! janitor clean-bounce
//! janitor clean-custom --column COLUMN --value VALUE
//! janitor rebuild-index [--online]
//! janitor remove-bots
//! janitor backup --to PATH
//! janitor sync-definitions
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/analytics-janitor/config.toml)
//! 3. Environment variables (JANITOR_*)
//! 4. CLI flags

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use janitor_daemon::{run_maintenance, Cli};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let snapshot = run_maintenance(
        cli.config.as_deref(),
        cli.log_level.as_deref(),
        cli.database_url.as_deref(),
        &cli.command,
    )
    .await?;

    if snapshot.failed {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
