//! Removal of visits recorded for robots.

use janitor_store::TemplateName;
use janitor_types::{Job, JobError};
use tracing::info;

use crate::context::MaintenanceContext;

pub async fn run(ctx: &MaintenanceContext, job: &Job) -> Result<u64, JobError> {
    let script = ctx.required_template(TemplateName::RemoveBots)?;

    ctx.audit_started(job);

    let script = &script;
    let removed = ctx
        .governor
        .governed(move || async move {
            let removed = ctx.executor.run_one(script).await?;
            Ok::<_, JobError>(removed)
        })
        .await?;

    info!(removed, "Bot visits removed");
    job.set_processed(removed);
    ctx.report(job, format!("Visitors removed: {removed}"));
    Ok(removed)
}
