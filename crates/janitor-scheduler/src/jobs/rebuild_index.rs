//! Index rebuild. Not governed: it deletes nothing.

use janitor_store::TemplateName;
use janitor_types::{Job, JobError};
use tracing::info;

use crate::context::MaintenanceContext;

pub async fn run(ctx: &MaintenanceContext, job: &Job, online: bool) -> Result<(), JobError> {
    let name = if online {
        TemplateName::RebuildIndexOnline
    } else {
        TemplateName::RebuildIndex
    };
    let script = ctx.required_template(name)?;

    ctx.audit_started(job);
    ctx.executor.run_one(&script).await?;

    info!(online, "Index rebuild complete");
    // Rebuild scripts report no meaningful row count.
    job.set_processed(0);
    ctx.report(job, "Rebuild index is completed.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use janitor_types::MaintenanceOperation;

    #[tokio::test]
    async fn test_online_flag_selects_script() {
        let t = TestContext::new();
        let job = Job::new(&MaintenanceOperation::RebuildIndex { online: true });
        run(&t.ctx, &job, true).await.unwrap();
        run(&t.ctx, &job, false).await.unwrap();

        assert_eq!(t.store.statements(), vec!["REINDEX CONCURRENTLY", "REINDEX"]);
        assert_eq!(job.processed(), 0);
    }

    #[tokio::test]
    async fn test_rebuild_does_not_touch_constraints() {
        let t = TestContext::new();
        let job = Job::new(&MaintenanceOperation::RebuildIndex { online: false });
        run(&t.ctx, &job, false).await.unwrap();

        assert!(!t.store.statements().iter().any(|s| s.contains("CONSTRAINT")));
        assert_eq!(job.snapshot().messages, vec!["Rebuild index is completed."]);
    }
}
