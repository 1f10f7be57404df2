//! Job submission, polling and retention.
//!
//! Each submitted job runs on its own tokio task. Jobs are never cancelled
//! mid-flight: shutdown stops intake and waits for running jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use janitor_types::{JobId, JobSnapshot, JobState, MaintenanceOperation};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::context::MaintenanceContext;
use crate::error::SchedulerError;
use crate::registry::JobRegistry;
use crate::runner::JobRunner;

pub struct JobScheduler {
    runner: Arc<JobRunner>,
    registry: Arc<JobRegistry>,
    retention: Duration,
    tracker: TaskTracker,
    shutdown_token: CancellationToken,
}

impl JobScheduler {
    /// Create a scheduler whose jobs stay pollable for `retention` after
    /// they finish.
    pub fn new(ctx: Arc<MaintenanceContext>, retention: Duration) -> Self {
        Self {
            runner: Arc::new(JobRunner::new(ctx)),
            registry: Arc::new(JobRegistry::new()),
            retention,
            tracker: TaskTracker::new(),
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        self.registry.clone()
    }

    /// Queue `operation` as a new job and start it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, operation: MaintenanceOperation) -> Result<JobId, SchedulerError> {
        if self.shutdown_token.is_cancelled() {
            return Err(SchedulerError::ShuttingDown);
        }

        let job = janitor_types::Job::new(&operation);
        let id = job.id();
        self.registry.register(job.clone());
        info!(job_id = %id, operation = %operation, "Job submitted");

        let runner = self.runner.clone();
        self.tracker.spawn(async move {
            job.advance(JobState::Running);
            runner.execute(&job, &operation).await;
        });

        Ok(id)
    }

    /// Snapshot of a job, or `None` if it is unknown or was evicted.
    pub fn poll(&self, id: JobId) -> Option<JobSnapshot> {
        self.registry.snapshot(id)
    }

    /// Poll `id` every `interval` until it is finished.
    pub async fn wait(&self, id: JobId, interval: Duration) -> Result<JobSnapshot, SchedulerError> {
        loop {
            let snapshot = self.poll(id).ok_or(SchedulerError::JobNotFound(id))?;
            if snapshot.is_finished() {
                return Ok(snapshot);
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Evict expired jobs every `interval` until shutdown.
    pub fn start_retention_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let retention = self.retention;
        let token = self.shutdown_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Retention sweeper stopped");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        registry.evict_expired(retention, Utc::now());
                    }
                }
            }
        })
    }

    /// Stop accepting jobs, stop the sweeper, and wait for running jobs.
    pub async fn shutdown(&self) {
        info!(running = self.tracker.len(), "Initiating scheduler shutdown");
        self.shutdown_token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("Scheduler shutdown complete");
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }
}
