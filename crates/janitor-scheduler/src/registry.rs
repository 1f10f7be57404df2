//! Job registry for submitted jobs.
//!
//! The `JobRegistry` keeps every submitted job pollable by id until the
//! retention window after it finished has passed.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use janitor_types::{Job, JobId, JobSnapshot};
use tracing::debug;

/// Thread-safe registry of jobs by id.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, Job>> {
        self.jobs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, Job>> {
        self.jobs.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(&self, job: Job) {
        self.write().insert(job.id(), job);
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.read().get(&id).cloned()
    }

    /// Read-only snapshot of a job.
    pub fn snapshot(&self, id: JobId) -> Option<JobSnapshot> {
        self.read().get(&id).map(Job::snapshot)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop jobs that finished at least `retention` before `now`.
    ///
    /// Returns the number of jobs evicted.
    pub fn evict_expired(&self, retention: Duration, now: DateTime<Utc>) -> usize {
        let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
        let mut jobs = self.write();
        let before = jobs.len();
        jobs.retain(|_, job| match job.finished_at() {
            Some(finished_at) => now.signed_duration_since(finished_at) < retention,
            None => true,
        });
        let evicted = before - jobs.len();
        if evicted > 0 {
            debug!(evicted, remaining = jobs.len(), "Evicted expired jobs");
        }
        evicted
    }
}
