//! # janitor-types
//!
//! Shared domain types for the analytics janitor.
//!
//! This crate defines the data structures every other janitor crate speaks:
//! - Jobs: pollable units of asynchronous maintenance work
//! - Operations: the closed catalog of bulk maintenance operations
//! - Script outcomes and synchronization tallies
//! - The error taxonomy surfaced to operators
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use janitor_types::{Job, JobState, MaintenanceOperation};
//!
//! let job = Job::new(&MaintenanceOperation::RemoveBots);
//! assert_eq!(job.state(), JobState::Queued);
//! ```

pub mod config;
pub mod error;
pub mod job;
pub mod operation;
pub mod outcome;

pub use config::{Settings, SyncFailurePolicy};
pub use error::{DatastoreError, DatastoreErrorKind, JobError, SettingsError};
pub use job::{Job, JobId, JobSnapshot, JobState};
pub use operation::{ConstraintMode, MaintenanceOperation, THRESHOLD_FORMAT};
pub use outcome::{ScriptOutcome, StatementFailure, SyncResult};
