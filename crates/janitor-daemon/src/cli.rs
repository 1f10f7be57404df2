//! CLI argument parsing for the janitor.
//!
//! CLI flags override every other configuration source.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use janitor_types::MaintenanceOperation;

/// Analytics datastore janitor
///
/// Runs one bulk maintenance operation against the analytics datastore and
/// follows it until it finishes.
#[derive(Parser, Debug)]
#[command(name = "janitor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides the default config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override the datastore connection string
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Maintenance commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Delete all collected visit data
    CleanAll {
        /// Also delete IP lookup data
        #[arg(long)]
        remove_ips: bool,
    },

    /// Delete visits older than a point in time
    CleanOlderThan {
        /// Threshold, "YYYY-MM-DD HH:MM:SS"
        #[arg(long)]
        before: String,
    },

    /// Delete bounce visits
    CleanBounce,

    /// Delete visits where a column equals a value
    CleanCustom {
        /// Column to compare
        #[arg(long)]
        column: String,

        /// Value to compare against (integer, GUID or text)
        #[arg(long)]
        value: String,
    },

    /// Rebuild indexes
    RebuildIndex {
        /// Rebuild online
        #[arg(long)]
        online: bool,
    },

    /// Delete visits recorded for robots
    RemoveBots,

    /// Back up the datastore
    Backup {
        /// Backup file, or an existing directory to put it in
        #[arg(long)]
        to: PathBuf,
    },

    /// Push definition records into the datastore
    SyncDefinitions,
}

impl Commands {
    /// The maintenance operation this command submits.
    pub fn to_operation(&self) -> Result<MaintenanceOperation> {
        let operation = match self {
            Commands::CleanAll { remove_ips } => MaintenanceOperation::FullClean {
                remove_ips: *remove_ips,
            },
            Commands::CleanOlderThan { before } => MaintenanceOperation::FilteredCleanOlderThan {
                threshold: MaintenanceOperation::parse_threshold(before)
                    .with_context(|| format!("Invalid threshold '{before}', expected YYYY-MM-DD HH:MM:SS"))?,
            },
            Commands::CleanBounce => MaintenanceOperation::FilteredCleanBounce,
            Commands::CleanCustom { column, value } => MaintenanceOperation::FilteredCleanCustomRule {
                column: column.clone(),
                literal: value.clone(),
            },
            Commands::RebuildIndex { online } => MaintenanceOperation::RebuildIndex { online: *online },
            Commands::RemoveBots => MaintenanceOperation::RemoveBots,
            Commands::Backup { to } => MaintenanceOperation::Backup {
                destination_path: to.clone(),
            },
            Commands::SyncDefinitions => MaintenanceOperation::SyncDefinitions,
        };
        Ok(operation)
    }
}
