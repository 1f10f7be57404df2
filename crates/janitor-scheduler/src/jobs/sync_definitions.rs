//! Synchronization of the definition hierarchy into the datastore.

use janitor_definitions::{SyncError, DEFINITION_ROOTS};
use janitor_types::{Job, JobError, SyncResult};
use tracing::info;

use crate::context::MaintenanceContext;

/// Synchronize every definition root, in order. Returns one result per root.
///
/// The job's processed count is the running total of successful pushes.
pub async fn run(ctx: &MaintenanceContext, job: &Job) -> Result<Vec<SyncResult>, JobError> {
    ctx.audit_started(job);

    let mut total = SyncResult::default();
    let mut results = Vec::with_capacity(DEFINITION_ROOTS.len());

    for root in DEFINITION_ROOTS {
        let item = ctx
            .hierarchy
            .root(root.path)
            .ok_or_else(|| anyhow::Error::from(SyncError::RootNotFound(root.path.to_string())))?;

        let result = ctx.synchronizer.sync(&item, ctx.pusher.as_ref()).await;
        info!(
            root = root.label,
            success = result.success_count,
            failed = result.fail_count,
            "Definition root synchronized"
        );

        total += result;
        job.set_processed(total.success_count);
        ctx.report(
            job,
            format!(
                "{}: {} success, {} failed.",
                root.label, result.success_count, result.fail_count
            ),
        );
        results.push(result);
    }

    Ok(results)
}
