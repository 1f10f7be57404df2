//! Constraint governance around bulk deletes.
//!
//! The referential-integrity mode is global to the datastore. Every cascade
//! window is serialized twice: by the governor's own lock within a process,
//! and by the datastore's constraint lock across every client. A governed
//! body runs only between a successful switch to cascade constraints and the
//! switch back to standard constraints, and the switch back happens on
//! every exit path, including panics.

use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use janitor_types::{ConstraintMode, JobError};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::executor::ScriptExecutor;
use crate::templates::{TemplateName, TemplateResolver};

pub struct ConstraintGovernor {
    executor: ScriptExecutor,
    templates: Arc<dyn TemplateResolver>,
    dialect: String,
    /// Last mode the datastore is known to be in. Held for the whole
    /// cascade window.
    mode: Mutex<ConstraintMode>,
}

impl ConstraintGovernor {
    pub fn new(
        executor: ScriptExecutor,
        templates: Arc<dyn TemplateResolver>,
        dialect: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            templates,
            dialect: dialect.into(),
            mode: Mutex::new(ConstraintMode::Standard),
        }
    }

    /// Current mode, or `None` while a governed operation holds the lock.
    pub fn current_mode(&self) -> Option<ConstraintMode> {
        self.mode.try_lock().ok().map(|mode| *mode)
    }

    /// Run `body` inside the cascade window.
    ///
    /// Waits for any other governed operation, in this process or another
    /// client of the datastore, to finish first. Constraints are restored
    /// exactly once after `body` completes, fails or panics.
    /// A restore failure takes precedence over the body's own result. A
    /// panic in `body` is resumed after restoration.
    pub async fn governed<T, F, Fut>(&self, body: F) -> Result<T, JobError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, JobError>>,
    {
        let mut mode = self.mode.lock().await;

        let datastore = self.executor.datastore();
        datastore.acquire_constraint_lock().await.map_err(|e| {
            JobError::ConstraintFailure(format!("constraint lock could not be taken: {e}"))
        })?;

        // The drop step may already have removed the standard constraints,
        // so the datastore is no longer known to be in standard mode.
        *mode = ConstraintMode::Cascade;
        let result = match self.enter_cascade_mode().await {
            Ok(()) => AssertUnwindSafe(body()).catch_unwind().await,
            Err(e) => Ok(Err(e)),
        };

        let restored = self.restore().await;
        if restored.is_ok() {
            *mode = ConstraintMode::Standard;
        }
        if let Err(e) = datastore.release_constraint_lock().await {
            warn!(error = %e, "Failed to release the constraint lock");
        }

        match (result, restored) {
            (Err(panic), Err(e)) => {
                error!(error = %e, "Constraints not restored after panic");
                resume_unwind(panic)
            }
            (Err(panic), Ok(())) => resume_unwind(panic),
            (Ok(outcome), Ok(())) => outcome,
            (Ok(Ok(_)), Err(e)) => Err(e),
            (Ok(Err(body_error)), Err(e)) => {
                warn!(error = %body_error, "Operation failed before constraints were restored");
                Err(e)
            }
        }
    }

    async fn enter_cascade_mode(&self) -> Result<(), JobError> {
        self.switch_to(ConstraintMode::Cascade).await
    }

    async fn restore(&self) -> Result<(), JobError> {
        self.switch_to(ConstraintMode::Standard).await
    }

    /// Drop the current constraints, then create them in `target` form.
    ///
    /// Drop failures are only logged. Create failures are fatal.
    async fn switch_to(&self, target: ConstraintMode) -> Result<(), JobError> {
        let drop = self
            .templates
            .resolve(TemplateName::DropConstraints, &self.dialect);
        let dropped = self.executor.run_many(&drop).await;
        if !dropped.all_succeeded() {
            warn!(
                failed = dropped.failures.len(),
                attempted = dropped.attempted(),
                "Failed to correctly drop constraints"
            );
        }

        let create_name = match target {
            ConstraintMode::Cascade => TemplateName::AddConstraintsCascadeDelete,
            ConstraintMode::Standard => TemplateName::AddConstraints,
        };
        let create = self.templates.resolve(create_name, &self.dialect);
        if create.trim().is_empty() {
            return Err(JobError::ConstraintFailure(format!(
                "no '{}' template for dialect '{}'",
                create_name, self.dialect
            )));
        }

        let created = self.executor.run_many(&create).await;
        if !created.all_succeeded() {
            return Err(JobError::ConstraintFailure(format!(
                "{} of {} statements of '{}' failed",
                created.failures.len(),
                created.attempted(),
                create_name
            )));
        }

        info!(mode = ?target, "Constraints switched");
        Ok(())
    }
}
