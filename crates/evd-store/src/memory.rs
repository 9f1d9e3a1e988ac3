//! In-memory job store.
//!
//! Reference implementation of [`JobStore`] backed by a mutex-guarded
//! map and FIFO queue. Claims are serialized through the mutex, which
//! gives the at-most-one-owner guarantee without a native atomic claim
//! primitive.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use evd_models::{Event, Job, JobId, JobStatus};

use crate::error::{StoreError, StoreResult};
use crate::store::JobStore;

#[derive(Default)]
struct StoreInner {
    jobs: HashMap<JobId, Job>,
    queue: VecDeque<JobId>,
}

/// Mutex-guarded in-memory store.
#[derive(Default)]
pub struct InMemoryJobStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs currently waiting in the queue.
    pub async fn queue_len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    /// Snapshot of every job, for tests and diagnostics.
    pub async fn all_jobs(&self) -> Vec<Job> {
        self.inner.lock().await.jobs.values().cloned().collect()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue_job(&self, media_reference: &str) -> StoreResult<Job> {
        let job = Job::new(media_reference);
        let mut inner = self.inner.lock().await;
        inner.queue.push_back(job.id.clone());
        inner.jobs.insert(job.id.clone(), job.clone());
        debug!(job_id = %job.id, "Enqueued job");
        Ok(job)
    }

    async fn claim_next_queued(&self) -> StoreResult<Option<Job>> {
        let mut inner = self.inner.lock().await;
        while let Some(id) = inner.queue.pop_front() {
            match inner.jobs.get(&id) {
                Some(job) if job.status == JobStatus::Queued => {
                    debug!(job_id = %id, "Claimed job");
                    return Ok(Some(job.clone()));
                }
                // Already moved on (e.g. failed pre-flight); keep looking.
                _ => continue,
            }
        }
        Ok(None)
    }

    async fn persist_result(
        &self,
        job_id: &JobId,
        status: JobStatus,
        events: Vec<Event>,
        error_detail: Option<String>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let job = inner
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::JobNotFound(job_id.clone()))?;

        if job.is_terminal() {
            if job.status == status {
                debug!(job_id = %job_id, status = %status, "Terminal result re-persisted, no-op");
            } else {
                warn!(
                    job_id = %job_id,
                    current = %job.status,
                    requested = %status,
                    "Ignoring conflicting write to terminal job"
                );
            }
            return Ok(());
        }

        match status {
            JobStatus::Processing => job.start()?,
            JobStatus::Completed => job.complete(events)?,
            JobStatus::Failed => {
                job.fail(error_detail.unwrap_or_else(|| "unknown error".to_string()))?
            }
            JobStatus::Queued => {
                return Err(StoreError::Transition(evd_models::TransitionError {
                    from: job.status,
                    to: JobStatus::Queued,
                }))
            }
        }
        Ok(())
    }

    async fn get_job(&self, job_id: &JobId) -> StoreResult<Job> {
        let inner = self.inner.lock().await;
        inner
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| StoreError::JobNotFound(job_id.clone()))
    }
}
