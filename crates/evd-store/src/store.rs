//! Job store boundary contract.
//!
//! The persistence collaborator (document store holding the
//! `detection_jobs` and `detections` collections) lives outside the
//! pipeline; this trait is the seam it plugs into.

use async_trait::async_trait;

use evd_models::{Event, Job, JobId, JobStatus};

use crate::error::StoreResult;

/// Boundary to the external persistence collaborator.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a job record in QUEUED state for the given media.
    async fn enqueue_job(&self, media_reference: &str) -> StoreResult<Job>;

    /// Atomically claim the next QUEUED job, or `None` if the queue is
    /// empty. A claimed job is owned by exactly one caller; implementors
    /// without a native atomic claim must serialize claims through their
    /// own mutual exclusion.
    async fn claim_next_queued(&self) -> StoreResult<Option<Job>>;

    /// Record a job's status, events and error detail.
    ///
    /// Idempotent: re-persisting an already-terminal job with the same
    /// status is a no-op, not an error. A conflicting status never
    /// overwrites a terminal record.
    async fn persist_result(
        &self,
        job_id: &JobId,
        status: JobStatus,
        events: Vec<Event>,
        error_detail: Option<String>,
    ) -> StoreResult<()>;

    /// Synchronous read path: the job as last persisted.
    async fn get_job(&self, job_id: &JobId) -> StoreResult<Job>;
}
