//! Collaborators shared by every maintenance job.

use std::sync::Arc;

use janitor_definitions::{
    DefinitionPusher, DefinitionSynchronizer, HierarchySource, TemplateDefinitionPusher,
};
use janitor_store::{ConstraintGovernor, Datastore, ScriptExecutor, TemplateName, TemplateResolver};
use janitor_types::{Job, JobError, Settings};
use tracing::debug;

use crate::audit::AuditLog;

/// Everything an operation needs to run.
///
/// One context serves every job of a scheduler, so all governed operations
/// share the same [`ConstraintGovernor`]. Separate contexts are still
/// serialized by the datastore's constraint lock.
pub struct MaintenanceContext {
    pub executor: ScriptExecutor,
    pub governor: Arc<ConstraintGovernor>,
    pub templates: Arc<dyn TemplateResolver>,
    pub hierarchy: Arc<dyn HierarchySource>,
    pub pusher: Arc<dyn DefinitionPusher>,
    pub synchronizer: DefinitionSynchronizer,
    pub audit: Arc<dyn AuditLog>,
    pub dialect: String,
    pub actor: String,
    pub backup_filename_template: String,
}

impl MaintenanceContext {
    /// Build a context from settings. Definitions are pushed through the
    /// `deploy-definition` template unless [`with_pusher`](Self::with_pusher)
    /// replaces the pusher.
    pub fn new(
        datastore: Arc<dyn Datastore>,
        templates: Arc<dyn TemplateResolver>,
        hierarchy: Arc<dyn HierarchySource>,
        audit: Arc<dyn AuditLog>,
        settings: &Settings,
    ) -> Self {
        let executor = ScriptExecutor::from_settings(datastore, settings);
        let governor = Arc::new(ConstraintGovernor::new(
            executor.clone(),
            templates.clone(),
            settings.dialect.clone(),
        ));
        let pusher = Arc::new(TemplateDefinitionPusher::new(
            executor.clone(),
            templates.clone(),
            settings.dialect.clone(),
        ));

        Self {
            executor,
            governor,
            templates,
            hierarchy,
            pusher,
            synchronizer: DefinitionSynchronizer::new(settings.sync_failure_policy),
            audit,
            dialect: settings.dialect.clone(),
            actor: settings.actor.clone(),
            backup_filename_template: settings.backup_filename_template.clone(),
        }
    }

    pub fn with_pusher(mut self, pusher: Arc<dyn DefinitionPusher>) -> Self {
        self.pusher = pusher;
        self
    }

    /// Resolve a template for the configured dialect. Empty if missing.
    pub fn template(&self, name: TemplateName) -> String {
        self.templates.resolve(name, &self.dialect)
    }

    /// Resolve a template the operation cannot run without.
    pub fn required_template(&self, name: TemplateName) -> Result<String, JobError> {
        let body = self.template(name);
        if body.trim().is_empty() {
            return Err(JobError::precondition(format!(
                "No '{}' script is available for dialect '{}'",
                name, self.dialect
            )));
        }
        Ok(body)
    }

    /// Resolve a template the operation can do without.
    pub fn optional_template(&self, name: TemplateName) -> Option<String> {
        let body = self.template(name);
        if body.trim().is_empty() {
            debug!(template = %name, dialect = %self.dialect, "Optional script not available, skipping");
            return None;
        }
        Some(body)
    }

    pub fn audit(&self, message: &str) {
        self.audit.record(&self.actor, message);
    }

    /// Record that `job` is about to do its work.
    pub fn audit_started(&self, job: &Job) {
        self.audit(&format!("'{}' task started", job.operation()));
    }

    /// Append a diagnostic line to `job` and to the audit trail.
    pub fn report(&self, job: &Job, message: impl Into<String>) {
        let message = message.into();
        self.audit(&message);
        job.add_message(message);
    }
}
