//! The maintenance operation catalog.
//!
//! Each module implements one operation against a [`MaintenanceContext`],
//! writing its diagnostics and processed count onto the job:
//! - `clean_all` - Delete all collected data (governed)
//! - `filtered_clean` - Delete visits by age, bounce or custom rule (governed)
//! - `remove_bots` - Delete robot visits (governed)
//! - `rebuild_index` - Rebuild indexes online or offline
//! - `backup` - Write a datastore-native backup
//! - `sync_definitions` - Push the definition hierarchy into the datastore

pub mod backup;
pub mod clean_all;
pub mod filtered_clean;
pub mod rebuild_index;
pub mod remove_bots;
pub mod sync_definitions;

use janitor_types::{Job, JobError, MaintenanceOperation};

use crate::context::MaintenanceContext;

/// Run `operation` for `job`.
pub async fn run_operation(
    ctx: &MaintenanceContext,
    job: &Job,
    operation: &MaintenanceOperation,
) -> Result<(), JobError> {
    match operation {
        MaintenanceOperation::FullClean { remove_ips } => {
            clean_all::run(ctx, job, *remove_ips).await?;
        }
        MaintenanceOperation::FilteredCleanOlderThan { threshold } => {
            filtered_clean::older_than(ctx, job, *threshold).await?;
        }
        MaintenanceOperation::FilteredCleanBounce => {
            filtered_clean::bounce(ctx, job).await?;
        }
        MaintenanceOperation::FilteredCleanCustomRule { column, literal } => {
            filtered_clean::custom_rule(ctx, job, column, literal).await?;
        }
        MaintenanceOperation::RebuildIndex { online } => {
            rebuild_index::run(ctx, job, *online).await?;
        }
        MaintenanceOperation::RemoveBots => {
            remove_bots::run(ctx, job).await?;
        }
        MaintenanceOperation::Backup { destination_path } => {
            backup::run(ctx, job, destination_path).await?;
        }
        MaintenanceOperation::SyncDefinitions => {
            sync_definitions::run(ctx, job).await?;
        }
    }
    Ok(())
}
