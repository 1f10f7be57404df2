//! Error types for the scheduler crate.

use janitor_types::JobId;
use thiserror::Error;

/// Errors that can occur during scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler no longer accepts jobs
    #[error("Scheduler is shutting down")]
    ShuttingDown,

    /// No job with this id is registered (never submitted, or evicted)
    #[error("Job not found: {0}")]
    JobNotFound(JobId),
}
