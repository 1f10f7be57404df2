//! Datastore backup.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use janitor_store::{quote_literal, render, TemplateName};
use janitor_types::{Job, JobError};
use tracing::info;

use crate::context::MaintenanceContext;

/// Format of `{timestamp}` in the backup file name template.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Work out the backup file for `destination`.
///
/// An existing directory gets a file named from `filename_template`.
/// Anything else is taken as the file itself and its directory must exist.
pub fn resolve_backup_file(
    destination: &Path,
    filename_template: &str,
    database: &str,
    now: DateTime<Local>,
) -> Result<PathBuf, JobError> {
    if destination.is_dir() {
        let timestamp = now.format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let file_name = render(
            filename_template,
            &[("database", database), ("timestamp", timestamp.as_str())],
        );
        return Ok(destination.join(file_name));
    }

    let directory = match destination.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
        Some(parent) => parent,
        None => {
            return Err(JobError::precondition(format!(
                "Path could not be used as a backup file: {}",
                destination.display()
            )))
        }
    };
    if !directory.is_dir() {
        return Err(JobError::precondition(format!(
            "Directory must exist: {}",
            destination.display()
        )));
    }
    Ok(destination.to_path_buf())
}

/// Back up the datastore to `destination`. Returns the backup file path.
pub async fn run(
    ctx: &MaintenanceContext,
    job: &Job,
    destination: &Path,
) -> Result<PathBuf, JobError> {
    let database = ctx.executor.database_name().to_string();
    let file = resolve_backup_file(
        destination,
        &ctx.backup_filename_template,
        &database,
        Local::now(),
    )?;
    let template = ctx.required_template(TemplateName::BackupDatabase)?;

    ctx.audit_started(job);

    let path = quote_literal(&file.to_string_lossy());
    let script = render(
        &template,
        &[("database", database.as_str()), ("path", path.as_str())],
    );
    ctx.executor.run_one(&script).await?;

    info!(database = %database, path = %file.display(), "Backup created");
    job.set_processed(0);
    ctx.report(job, format!("New backup was created at {}", file.display()));
    Ok(file)
}
