//! Jobs: pollable units of asynchronous maintenance work.
//!
//! A `Job` is a cheap, cloneable handle. The scheduler moves it through
//! its states, the job runner records progress and diagnostics on it, and
//! pollers read consistent snapshots of it.

use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::MaintenanceOperation;

/// Unique, time-ordered job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(Ulid);

impl JobId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job. Moves only forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Finished,
}

/// Read-only copy of a job, handed to pollers.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub id: JobId,
    pub operation: String,
    pub state: JobState,
    pub failed: bool,
    pub processed: u64,
    pub messages: Vec<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    pub fn is_finished(&self) -> bool {
        self.state == JobState::Finished
    }
}

#[derive(Debug)]
struct JobStatus {
    state: JobState,
    failed: bool,
    processed: u64,
    messages: Vec<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

/// Shared handle to one job.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    operation: String,
    submitted_at: DateTime<Utc>,
    status: Arc<RwLock<JobStatus>>,
}

impl Job {
    /// Create a queued job for the given operation.
    pub fn new(operation: &MaintenanceOperation) -> Self {
        Self {
            id: JobId::new(),
            operation: operation.to_string(),
            submitted_at: Utc::now(),
            status: Arc::new(RwLock::new(JobStatus {
                state: JobState::Queued,
                failed: false,
                processed: 0,
                messages: Vec::new(),
                started_at: None,
                finished_at: None,
            })),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    // A panic while a writer holds the lock leaves plain data behind, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, JobStatus> {
        self.status.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, JobStatus> {
        self.status.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> JobState {
        self.read().state
    }

    pub fn is_failed(&self) -> bool {
        self.read().failed
    }

    pub fn processed(&self) -> u64 {
        self.read().processed
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.read().finished_at
    }

    /// Move the job to `next`.
    ///
    /// Returns `false` (and changes nothing) if `next` is not strictly
    /// ahead of the current state.
    pub fn advance(&self, next: JobState) -> bool {
        let mut status = self.write();
        if next <= status.state {
            return false;
        }
        let now = Utc::now();
        if next >= JobState::Running && status.started_at.is_none() {
            status.started_at = Some(now);
        }
        if next == JobState::Finished {
            status.finished_at = Some(now);
        }
        status.state = next;
        true
    }

    /// Flag the job as failed. The flag is never cleared.
    pub fn mark_failed(&self) {
        self.write().failed = true;
    }

    pub fn set_processed(&self, processed: u64) {
        self.write().processed = processed;
    }

    /// Append a human-readable message to the job log.
    pub fn add_message(&self, message: impl Into<String>) {
        self.write().messages.push(message.into());
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let status = self.read();
        JobSnapshot {
            id: self.id,
            operation: self.operation.clone(),
            state: status.state,
            failed: status.failed,
            processed: status.processed,
            messages: status.messages.clone(),
            submitted_at: self.submitted_at,
            started_at: status.started_at,
            finished_at: status.finished_at,
        }
    }
}
