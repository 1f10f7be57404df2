//! Maintenance job execution for the analytics janitor.
//!
//! This crate runs bulk maintenance operations as pollable jobs:
//!
//! - `JobScheduler` submits each operation as a job on its own tokio task
//!   and keeps it pollable until its retention window has passed
//! - `JobRunner` drives one operation, classifies any failure into
//!   operator-facing messages and always leaves the job Finished
//! - `jobs` holds the operation catalog; bulk deletes run inside the
//!   shared constraint bracket
//!
//! # Example
//!
//! ```ignore
//! use janitor_scheduler::{JobScheduler, MaintenanceContext};
//!
//! let scheduler = JobScheduler::new(Arc::new(ctx), settings.job_retention());
//! let id = scheduler.submit(MaintenanceOperation::RemoveBots)?;
//! let snapshot = scheduler.wait(id, settings.poll_interval()).await?;
//! ```

mod audit;
mod context;
mod error;
pub mod jobs;
mod registry;
mod runner;
mod scheduler;

#[cfg(test)]
mod testing;

pub use audit::{AuditEntry, AuditLog, MemoryAuditLog, TracingAuditLog};
pub use context::MaintenanceContext;
pub use error::SchedulerError;
pub use registry::JobRegistry;
pub use runner::{
    JobRunner, COMPLETED_MESSAGE, CONSTRAINT_FAILURE_MESSAGE, DATASTORE_ERROR_MESSAGE,
    SHORT_INFO_CHARS, TIMEOUT_MESSAGE, UNEXPECTED_ERROR_MESSAGE,
};
pub use scheduler::JobScheduler;
