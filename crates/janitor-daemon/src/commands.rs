//! Command implementations for the janitor CLI.
//!
//! Every command builds the same pipeline: settings, datastore, templates,
//! scheduler. It then submits exactly one job and follows it to the end.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use janitor_definitions::{HierarchySource, JsonHierarchy};
use janitor_scheduler::{JobScheduler, MaintenanceContext, SchedulerError, TracingAuditLog};
use janitor_store::{DirectoryTemplateResolver, PgDatastore};
use janitor_types::{JobId, JobSnapshot, MaintenanceOperation, Settings};
use tracing::info;

use crate::cli::Commands;

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    database_url_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    if let Some(url) = database_url_override {
        settings.database_url = url.to_string();
    }

    Ok(settings)
}

fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Run one maintenance command to completion.
///
/// Prints each job message as it appears and returns the final snapshot.
pub async fn run_maintenance(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    database_url_override: Option<&str>,
    command: &Commands,
) -> Result<JobSnapshot> {
    let operation = command.to_operation()?;
    let settings = load_settings(config_path, log_level_override, database_url_override)?;
    init_logging(&settings)?;

    info!(
        dialect = %settings.dialect,
        templates = %settings.templates_dir,
        timeout_secs = settings.script_timeout_secs,
        "Janitor starting"
    );

    let templates = DirectoryTemplateResolver::new(settings.templates_path())
        .context("Failed to open template directory")?;
    let datastore = PgDatastore::connect(&settings.database_url, settings.script_timeout())
        .await
        .context("Failed to connect to the analytics datastore")?;

    let hierarchy: Arc<dyn HierarchySource> = match operation {
        MaintenanceOperation::SyncDefinitions => {
            let path = settings.definitions_file();
            Arc::new(
                JsonHierarchy::load(&path)
                    .with_context(|| format!("Failed to load definitions from {}", path.display()))?,
            )
        }
        _ => Arc::new(JsonHierarchy::default()),
    };

    let ctx = MaintenanceContext::new(
        Arc::new(datastore),
        Arc::new(templates),
        hierarchy,
        Arc::new(TracingAuditLog),
        &settings,
    );
    let scheduler = JobScheduler::new(Arc::new(ctx), settings.job_retention());
    let sweeper = scheduler.start_retention_sweeper(settings.job_retention().max(Duration::from_secs(1)));

    let id = scheduler.submit(operation)?;
    let followed = follow_job(&scheduler, id, settings.poll_interval(), |message| {
        println!("{message}");
    })
    .await;

    scheduler.shutdown().await;
    sweeper.await.context("Retention sweeper failed")?;

    let snapshot = followed?;
    info!(
        job_id = %snapshot.id,
        processed = snapshot.processed,
        failed = snapshot.failed,
        "Job finished"
    );
    Ok(snapshot)
}

/// Poll job `id` every `interval` until it finishes, handing each newly
/// appended message to `on_message` exactly once.
pub async fn follow_job(
    scheduler: &JobScheduler,
    id: JobId,
    interval: Duration,
    mut on_message: impl FnMut(&str),
) -> Result<JobSnapshot, SchedulerError> {
    let mut seen = 0;
    loop {
        let snapshot = scheduler.poll(id).ok_or(SchedulerError::JobNotFound(id))?;
        for message in snapshot.messages.iter().skip(seen) {
            on_message(message);
        }
        seen = snapshot.messages.len();

        if snapshot.is_finished() {
            return Ok(snapshot);
        }
        tokio::time::sleep(interval).await;
    }
}
