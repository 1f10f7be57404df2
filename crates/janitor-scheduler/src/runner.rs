//! The execution shell around one maintenance operation.
//!
//! Owns the job's failure classification and operator-facing messages.
//! Nothing raised by an operation, panics included, escapes `execute`.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use janitor_types::{DatastoreErrorKind, Job, JobError, JobState, MaintenanceOperation};
use tracing::{error, info, info_span, warn, Instrument};

use crate::context::MaintenanceContext;
use crate::jobs;

pub const CONSTRAINT_FAILURE_MESSAGE: &str =
    "There was problem with setting/removing constraints. Please re-run the task.";

pub const TIMEOUT_MESSAGE: &str = "Timeout was reached while running an SQL command on Analytics database. Please increase the value of 'script_timeout_secs' and try again.";

pub const DATASTORE_ERROR_MESSAGE: &str =
    "An exception occurred during running the SQL command. Please check the log file for details.";

pub const UNEXPECTED_ERROR_MESSAGE: &str = "Unexpected exception during running of the maintenance task. Please check the log files for more details.";

pub const COMPLETED_MESSAGE: &str = "The task is completed.";

/// Characters of the driver message shown to the operator for generic
/// datastore errors.
pub const SHORT_INFO_CHARS: usize = 200;

pub struct JobRunner {
    ctx: Arc<MaintenanceContext>,
}

impl JobRunner {
    pub fn new(ctx: Arc<MaintenanceContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &MaintenanceContext {
        &self.ctx
    }

    /// Run `operation` for `job` and leave the job Finished.
    ///
    /// Resets the processed count first. Every outcome appends at least one
    /// message to the job and writes an audit entry.
    pub async fn execute(&self, job: &Job, operation: &MaintenanceOperation) {
        let span = info_span!("job", job_id = %job.id(), operation = operation.name());
        async {
            job.set_processed(0);
            let messages_before = job.snapshot().messages.len();

            let outcome = AssertUnwindSafe(jobs::run_operation(&self.ctx, job, operation))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(())) => {
                    if job.snapshot().messages.len() == messages_before {
                        self.ctx.report(job, COMPLETED_MESSAGE);
                    }
                    info!(processed = job.processed(), "Job completed");
                }
                Ok(Err(e)) => self.fail(job, operation, e),
                Err(panic) => {
                    let e = JobError::Unexpected(anyhow::anyhow!(
                        "operation panicked: {}",
                        panic_message(panic.as_ref())
                    ));
                    self.fail(job, operation, e);
                }
            }
        }
        .instrument(span)
        .await;

        job.advance(JobState::Finished);
    }

    fn fail(&self, job: &Job, operation: &MaintenanceOperation, err: JobError) {
        job.mark_failed();
        let job_id = job.id();
        let operation = operation.name();

        let messages = match &err {
            JobError::ConstraintFailure(detail) => {
                error!(%job_id, operation, detail = %detail, "Constraints could not be set");
                vec![CONSTRAINT_FAILURE_MESSAGE.to_string()]
            }
            JobError::Datastore(e) => {
                error!(
                    %job_id,
                    operation,
                    kind = ?e.kind(),
                    error = %e,
                    "SQL error during the running of the task"
                );
                match e.kind() {
                    DatastoreErrorKind::Timeout => vec![TIMEOUT_MESSAGE.to_string()],
                    DatastoreErrorKind::RestrictedFeature(restriction) => {
                        vec![restriction.clone()]
                    }
                    DatastoreErrorKind::Generic => vec![
                        DATASTORE_ERROR_MESSAGE.to_string(),
                        format!("Short info: {}", e.short_info(SHORT_INFO_CHARS)),
                    ],
                }
            }
            JobError::Precondition(reason) => {
                warn!(%job_id, operation, reason = %reason, "Task could not be started");
                vec![format!("The task could not be started: {reason}")]
            }
            JobError::Unexpected(e) => {
                error!(%job_id, operation, error = ?e, "Unexpected exception during running of the task");
                vec![UNEXPECTED_ERROR_MESSAGE.to_string()]
            }
        };

        for message in messages {
            self.ctx.report(job, message);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use async_trait::async_trait;
    use janitor_definitions::{DefinitionItem, DefinitionPusher, PushError};
    use janitor_types::DatastoreError;
    use std::path::PathBuf;

    fn runner(t: TestContext) -> (JobRunner, TestContext) {
        let runner = JobRunner::new(t.shared());
        (runner, t)
    }

    async fn run(t: TestContext, operation: MaintenanceOperation) -> (Job, TestContext) {
        let (runner, t) = runner(t);
        let job = Job::new(&operation);
        job.advance(JobState::Running);
        runner.execute(&job, &operation).await;
        (job, t)
    }

    #[tokio::test]
    async fn test_success_finishes_without_failure() {
        let t = TestContext::new();
        t.store.set_rows("DELETE BOTS", 4);
        let (job, _t) = run(t, MaintenanceOperation::RemoveBots).await;

        let snap = job.snapshot();
        assert!(snap.is_finished());
        assert!(!snap.failed);
        assert_eq!(snap.processed, 4);
        assert_eq!(snap.messages, vec!["Visitors removed: 4"]);
    }

    #[tokio::test]
    async fn test_timeout_message() {
        let t = TestContext::new();
        t.store.fail_with("REINDEX", DatastoreError::timeout("Timeout expired"));
        let (job, t) = run(t, MaintenanceOperation::RebuildIndex { online: false }).await;

        let snap = job.snapshot();
        assert!(snap.is_finished());
        assert!(snap.failed);
        assert_eq!(snap.messages, vec![TIMEOUT_MESSAGE]);
        assert_eq!(t.audit.messages().last().map(String::as_str), Some(TIMEOUT_MESSAGE));
    }

    #[tokio::test]
    async fn test_restricted_feature_is_surfaced_verbatim() {
        let t = TestContext::new();
        t.store.fail_on(
            "REINDEX CONCURRENTLY",
            "Online index operations can only be performed in Enterprise edition of SQL Server.",
        );
        let (job, _t) = run(t, MaintenanceOperation::RebuildIndex { online: true }).await;

        assert!(job.is_failed());
        assert_eq!(
            job.snapshot().messages,
            vec!["Online index operations can only be performed in Enterprise edition of SQL Server"]
        );
    }

    #[tokio::test]
    async fn test_generic_error_gets_short_info() {
        let t = TestContext::new();
        let long = format!("relation does not exist {}", "x".repeat(500));
        t.store.fail_on("DELETE BOTS", &long);
        let (job, _t) = run(t, MaintenanceOperation::RemoveBots).await;

        let messages = job.snapshot().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], DATASTORE_ERROR_MESSAGE);
        assert!(messages[1].starts_with("Short info: relation does not exist"));
        assert!(messages[1].len() < long.len());
    }

    #[tokio::test]
    async fn test_constraint_failure_message() {
        let t = TestContext::new();
        t.store.fail_on("ADD CONSTRAINT CASCADE fk_pages", "cannot add");
        let (job, t) = run(t, MaintenanceOperation::FilteredCleanBounce).await;

        assert!(job.is_failed());
        assert_eq!(job.snapshot().messages, vec![CONSTRAINT_FAILURE_MESSAGE]);
        assert!(!t.store.statements().iter().any(|s| s == "DELETE BOUNCES"));
        assert!(t.store.constraints_restored());
    }

    #[tokio::test]
    async fn test_precondition_message() {
        let t = TestContext::new();
        let (job, t) = run(
            t,
            MaintenanceOperation::Backup {
                destination_path: PathBuf::from("/definitely/not/here/a.bak"),
            },
        )
        .await;

        assert!(job.is_failed());
        let messages = job.snapshot().messages;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("The task could not be started: Directory must exist"));
        assert!(!t.audit.messages().iter().any(|m| m.contains("task started")));
    }

    #[tokio::test]
    async fn test_missing_sync_root_is_unexpected() {
        let t = TestContext::with_hierarchy(Vec::new());
        let (job, _t) = run(t, MaintenanceOperation::SyncDefinitions).await;

        assert!(job.is_failed());
        assert_eq!(job.snapshot().messages, vec![UNEXPECTED_ERROR_MESSAGE]);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let t = TestContext::new();
        t.store.panic_on("DELETE BOTS");
        let (job, t) = run(t, MaintenanceOperation::RemoveBots).await;

        let snap = job.snapshot();
        assert!(snap.is_finished());
        assert!(snap.failed);
        assert_eq!(snap.messages, vec![UNEXPECTED_ERROR_MESSAGE]);
        assert!(t.store.constraints_restored());
    }

    /// Records the job's processed count at every push.
    struct ObservingPusher {
        job: Job,
        seen: std::sync::Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl DefinitionPusher for ObservingPusher {
        async fn push(&self, _item: &DefinitionItem, _parent_id: &str) -> Result<(), PushError> {
            self.seen.lock().unwrap().push(self.job.processed());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_processed_is_reset_before_the_operation_runs() {
        let op = MaintenanceOperation::SyncDefinitions;
        let job = Job::new(&op);
        job.set_processed(99);
        let pusher = Arc::new(ObservingPusher {
            job: job.clone(),
            seen: Default::default(),
        });
        let t = TestContext::with_pusher(pusher.clone());

        JobRunner::new(t.shared()).execute(&job, &op).await;

        assert!(!job.is_failed(), "{:?}", job.snapshot().messages);
        assert_eq!(pusher.seen.lock().unwrap().first(), Some(&0));
        assert_eq!(job.processed(), 7);
    }

    #[tokio::test]
    async fn test_processed_is_reset_on_failure() {
        let t = TestContext::new();
        t.store.fail_on("REINDEX", "boom");
        let (runner, _t) = runner(t);
        let op = MaintenanceOperation::RebuildIndex { online: false };
        let job = Job::new(&op);
        job.set_processed(99);

        runner.execute(&job, &op).await;

        assert_eq!(job.processed(), 0);
        assert_eq!(job.state(), JobState::Finished);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
