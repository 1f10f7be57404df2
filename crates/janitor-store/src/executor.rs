//! Script execution with per-statement fault isolation.

use std::sync::Arc;
use std::time::Duration;

use janitor_types::{DatastoreError, ScriptOutcome, Settings};
use tracing::{debug, error};

use crate::datastore::Datastore;

/// Split a composite script on `delimiter`, trimming each fragment and
/// dropping the ones that are empty or whitespace only.
pub fn split_statements(script: &str, delimiter: char) -> impl Iterator<Item = &str> {
    script
        .split(delimiter)
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
}

/// Runs scripts against a datastore with a bounded per-statement timeout.
#[derive(Clone)]
pub struct ScriptExecutor {
    datastore: Arc<dyn Datastore>,
    timeout: Duration,
    delimiter: char,
}

impl ScriptExecutor {
    pub fn new(datastore: Arc<dyn Datastore>, timeout: Duration, delimiter: char) -> Self {
        Self {
            datastore,
            timeout,
            delimiter,
        }
    }

    pub fn from_settings(datastore: Arc<dyn Datastore>, settings: &Settings) -> Self {
        Self::new(datastore, settings.script_timeout(), settings.delimiter())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn datastore(&self) -> &Arc<dyn Datastore> {
        &self.datastore
    }

    pub fn database_name(&self) -> &str {
        self.datastore.database_name()
    }

    /// Execute a single statement and return the affected row count.
    ///
    /// Datastore errors are returned to the caller as they were classified.
    pub async fn run_one(&self, script: &str) -> Result<u64, DatastoreError> {
        debug!(statement = %script, "Running statement");
        self.datastore.execute(script, self.timeout).await
    }

    /// Execute every statement of a composite script independently.
    ///
    /// A failing statement is logged and recorded; the remaining statements
    /// still run. Use [`ScriptOutcome::all_succeeded`] for the overall result.
    pub async fn run_many(&self, script: &str) -> ScriptOutcome {
        let mut outcome = ScriptOutcome::new();
        for statement in split_statements(script, self.delimiter) {
            match self.run_one(statement).await {
                Ok(rows) => outcome.record_success(rows),
                Err(e) => {
                    error!(statement = %statement, error = %e, "Statement could not be processed");
                    outcome.record_failure(statement, e.message());
                }
            }
        }
        debug!(
            succeeded = outcome.succeeded,
            failed = outcome.failures.len(),
            "Composite script finished"
        );
        outcome
    }
}
