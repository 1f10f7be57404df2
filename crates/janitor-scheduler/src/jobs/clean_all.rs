//! Full clean of all collected data.

use janitor_store::TemplateName;
use janitor_types::{Job, JobError};
use tracing::info;

use crate::context::MaintenanceContext;

/// Row counts of a full clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanAllReport {
    /// Rows removed by the primary delete script
    pub entries_removed: u64,
    /// Rows removed by the IP lookup script (0 unless requested)
    pub locations_removed: u64,
}

/// Delete every collected visit, optionally the IP lookup data, then the
/// helper tables, all inside the cascade window.
pub async fn run(
    ctx: &MaintenanceContext,
    job: &Job,
    remove_ips: bool,
) -> Result<CleanAllReport, JobError> {
    let clean = ctx.required_template(TemplateName::CleanAll)?;
    let ips = if remove_ips {
        Some(ctx.required_template(TemplateName::CleanGeoIpLookupData)?)
    } else {
        None
    };
    let helper = ctx.optional_template(TemplateName::CleanHelperData);

    ctx.audit_started(job);

    let (clean, ips, helper) = (&clean, ips.as_deref(), helper.as_deref());
    let report = ctx
        .governor
        .governed(move || async move {
            let entries_removed = ctx.executor.run_one(clean).await?;
            let locations_removed = match ips {
                Some(script) => ctx.executor.run_one(script).await?,
                None => 0,
            };
            if let Some(script) = helper {
                ctx.executor.run_one(script).await?;
            }
            Ok::<_, JobError>(CleanAllReport {
                entries_removed,
                locations_removed,
            })
        })
        .await?;

    info!(
        entries = report.entries_removed,
        locations = report.locations_removed,
        "Full clean complete"
    );
    job.set_processed(report.entries_removed);
    ctx.report(job, format!("Entries removed: {}", report.entries_removed));
    ctx.report(job, format!("Locations removed: {}", report.locations_removed));
    ctx.report(job, "The data from helper tables have been removed as well.");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use janitor_types::MaintenanceOperation;

    const OP: MaintenanceOperation = MaintenanceOperation::FullClean { remove_ips: true };

    #[tokio::test]
    async fn test_clean_all_with_ips() {
        let t = TestContext::new();
        t.store.set_rows("DELETE ALL", 120);
        t.store.set_rows("DELETE IPS", 7);
        let job = Job::new(&OP);

        let report = run(&t.ctx, &job, true).await.unwrap();

        assert_eq!(report.entries_removed, 120);
        assert_eq!(report.locations_removed, 7);
        assert_eq!(job.processed(), 120);
        assert_eq!(
            job.snapshot().messages,
            vec![
                "Entries removed: 120",
                "Locations removed: 7",
                "The data from helper tables have been removed as well."
            ]
        );
        let body = t.store.body_statements();
        assert_eq!(body, vec!["DELETE ALL", "DELETE IPS", "DELETE HELPER"]);
    }

    #[tokio::test]
    async fn test_clean_all_without_ips_skips_ip_script() {
        let t = TestContext::new();
        let job = Job::new(&MaintenanceOperation::FullClean { remove_ips: false });

        let report = run(&t.ctx, &job, false).await.unwrap();

        assert_eq!(report.locations_removed, 0);
        assert_eq!(t.store.body_statements(), vec!["DELETE ALL", "DELETE HELPER"]);
    }

    #[tokio::test]
    async fn test_clean_all_audits_before_running() {
        let t = TestContext::new();
        let job = Job::new(&OP);
        run(&t.ctx, &job, true).await.unwrap();

        assert_eq!(
            t.audit.messages()[0],
            "'clean_all(remove_ips=true)' task started"
        );
    }
}
