//! Job scheduler.
//!
//! Runs a fixed pool of worker loops that claim queued jobs from the
//! store, drive each one through the detection pipeline and persist the
//! terminal outcome. External cancellation and shutdown both flow
//! through watch channels observed between frames.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{counter, gauge};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use evd_models::{Job, JobId, JobStatus};
use evd_store::JobStore;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::processor::{process_job, PipelineContext};
use crate::retry::{retry_async, RetryConfig, RetryResult};

/// Scheduler driving N concurrent worker loops against a job store.
pub struct JobScheduler {
    config: WorkerConfig,
    store: Arc<dyn JobStore>,
    ctx: PipelineContext,
    shutdown: watch::Sender<bool>,
    cancellations: Arc<Mutex<HashMap<JobId, watch::Sender<bool>>>>,
    consumer_name: String,
}

impl JobScheduler {
    pub fn new(config: WorkerConfig, store: Arc<dyn JobStore>, ctx: PipelineContext) -> Self {
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            store,
            ctx,
            shutdown,
            cancellations: Arc::new(Mutex::new(HashMap::new())),
            consumer_name,
        }
    }

    /// Request cancellation of a job currently being processed.
    ///
    /// Returns `true` if the job was in flight and the signal was
    /// delivered. Queued or terminal jobs are not affected.
    pub async fn cancel(&self, job_id: &JobId) -> bool {
        let cancellations = self.cancellations.lock().await;
        match cancellations.get(job_id) {
            Some(tx) => tx.send(true).is_ok(),
            None => false,
        }
    }

    /// Signal all worker loops to stop after their current job.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Run the worker pool until shutdown is signalled.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting scheduler '{}' with {} workers",
            self.consumer_name, self.config.workers
        );

        let mut handles = Vec::with_capacity(self.config.workers);
        for worker_index in 0..self.config.workers {
            let store = Arc::clone(&self.store);
            let ctx = self.ctx.clone();
            let config = self.config.clone();
            let cancellations = Arc::clone(&self.cancellations);
            let mut shutdown_rx = self.shutdown.subscribe();

            handles.push(tokio::spawn(async move {
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }

                    let claimed = match store.claim_next_queued().await {
                        Ok(claimed) => claimed,
                        Err(e) => {
                            warn!(worker = worker_index, "Failed to claim job: {}", e);
                            tokio::time::sleep(config.poll_interval).await;
                            continue;
                        }
                    };

                    match claimed {
                        Some(job) => {
                            Self::execute_job(&store, &ctx, &config, &cancellations, job)
                                .await;
                        }
                        None => {
                            // Idle: wait for either new work or shutdown.
                            tokio::select! {
                                _ = shutdown_rx.changed() => {}
                                _ = tokio::time::sleep(config.poll_interval) => {}
                            }
                        }
                    }
                }
                debug!(worker = worker_index, "Worker loop stopped");
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker task panicked: {}", e);
            }
        }

        info!("Scheduler '{}' stopped", self.consumer_name);
        Ok(())
    }

    /// Drive one claimed job to a terminal state.
    async fn execute_job(
        store: &Arc<dyn JobStore>,
        ctx: &PipelineContext,
        config: &WorkerConfig,
        cancellations: &Arc<Mutex<HashMap<JobId, watch::Sender<bool>>>>,
        job: Job,
    ) {
        let logger = JobLogger::new(&job.id, "scheduler");
        gauge!("evd_jobs_in_flight").increment(1.0);

        // Pre-flight checks run before the job is marked processing, so
        // a rejected job fails straight from the queued state.
        if let Err(e) = Self::preflight(&job) {
            logger.log_error(&e.error_detail());
            Self::persist_terminal(store, config, &job.id, JobStatus::Failed, vec![], Some(e))
                .await;
            gauge!("evd_jobs_in_flight").decrement(1.0);
            return;
        }

        // The job is already off the queue, so a lost processing write
        // would orphan it. Retry, and on exhaustion fail the job with
        // the store cause rather than dropping it.
        let retry_config = RetryConfig::new("mark_processing")
            .with_max_retries(config.persist_retries)
            .with_base_delay(config.persist_base_delay);
        let marked = retry_async(&retry_config, || {
            store.persist_result(&job.id, JobStatus::Processing, vec![], None)
        })
        .await;
        if let RetryResult::Failed { error, attempts } = marked {
            logger.log_error(&format!(
                "failed to mark job processing after {} attempts: {}",
                attempts, error
            ));
            counter!("evd_jobs_failed_total").increment(1);
            Self::persist_terminal(
                store,
                config,
                &job.id,
                JobStatus::Failed,
                vec![],
                Some(WorkerError::Store(error)),
            )
            .await;
            gauge!("evd_jobs_in_flight").decrement(1.0);
            return;
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        cancellations.lock().await.insert(job.id.clone(), cancel_tx);

        let outcome = process_job(ctx, &job, cancel_rx)
            .instrument(logger.create_span())
            .await;

        cancellations.lock().await.remove(&job.id);

        match outcome {
            Ok(events) => {
                logger.log_completion(&format!("{} events detected", events.len()));
                counter!("evd_jobs_completed_total").increment(1);
                Self::persist_terminal(store, config, &job.id, JobStatus::Completed, events, None)
                    .await;
            }
            Err(e) => {
                if e.is_cancellation() {
                    logger.log_warning(&e.error_detail());
                    counter!("evd_jobs_cancelled_total").increment(1);
                } else {
                    logger.log_error(&e.error_detail());
                    counter!("evd_jobs_failed_total").increment(1);
                }
                Self::persist_terminal(store, config, &job.id, JobStatus::Failed, vec![], Some(e))
                    .await;
            }
        }

        gauge!("evd_jobs_in_flight").decrement(1.0);
    }

    fn preflight(job: &Job) -> Result<(), WorkerError> {
        if job.media_reference.trim().is_empty() {
            return Err(WorkerError::Preflight("empty media reference".to_string()));
        }
        Ok(())
    }

    /// Persist a terminal outcome with bounded retry.
    ///
    /// If a completed result cannot be persisted after all retries, the
    /// job is failed instead so it never lingers as processing forever.
    async fn persist_terminal(
        store: &Arc<dyn JobStore>,
        config: &WorkerConfig,
        job_id: &JobId,
        status: JobStatus,
        events: Vec<evd_models::Event>,
        cause: Option<WorkerError>,
    ) {
        let logger = JobLogger::new(job_id, "persist");
        let error_detail = cause.as_ref().map(|e| e.error_detail());

        let retry_config = RetryConfig::new("persist_result")
            .with_max_retries(config.persist_retries)
            .with_base_delay(config.persist_base_delay);

        let result = retry_async(&retry_config, || {
            store.persist_result(job_id, status, events.clone(), error_detail.clone())
        })
        .await;

        match result {
            RetryResult::Success(()) => {}
            RetryResult::Failed { error, attempts } => {
                logger.log_error(&format!(
                    "failed to persist {} after {} attempts: {}",
                    status, attempts, error
                ));
                counter!("evd_persist_failures_total").increment(1);

                if status == JobStatus::Completed {
                    let detail = format!("store: result persistence failed ({})", error);
                    if let Err(e) = store
                        .persist_result(job_id, JobStatus::Failed, vec![], Some(detail))
                        .await
                    {
                        error!(job_id = %job_id, "Unable to fail job after persist failure: {}", e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use evd_detect::MockDetector;
    use evd_media::{SamplingConfig, SyntheticSourceFactory};
    use evd_models::Event;
    use evd_store::{InMemoryJobStore, StoreError, StoreResult};

    /// Store wrapper rejecting the first few QUEUED -> PROCESSING writes.
    struct ProcessingOutageStore {
        inner: InMemoryJobStore,
        failures_left: AtomicU32,
    }

    impl ProcessingOutageStore {
        fn failing(n: u32) -> Self {
            Self {
                inner: InMemoryJobStore::new(),
                failures_left: AtomicU32::new(n),
            }
        }
    }

    #[async_trait]
    impl JobStore for ProcessingOutageStore {
        async fn enqueue_job(&self, media_reference: &str) -> StoreResult<Job> {
            self.inner.enqueue_job(media_reference).await
        }

        async fn claim_next_queued(&self) -> StoreResult<Option<Job>> {
            self.inner.claim_next_queued().await
        }

        async fn persist_result(
            &self,
            job_id: &JobId,
            status: JobStatus,
            events: Vec<Event>,
            error_detail: Option<String>,
        ) -> StoreResult<()> {
            if status == JobStatus::Processing && self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(StoreError::unavailable("simulated outage"));
            }
            self.inner
                .persist_result(job_id, status, events, error_detail)
                .await
        }

        async fn get_job(&self, job_id: &JobId) -> StoreResult<Job> {
            self.inner.get_job(job_id).await
        }
    }

    fn quick_config() -> WorkerConfig {
        WorkerConfig {
            workers: 2,
            poll_interval: Duration::from_millis(10),
            sampling: SamplingConfig {
                frame_stride: 1,
                max_frames: 0,
            },
            ..WorkerConfig::default()
        }
    }

    fn scheduler_with(
        store: Arc<InMemoryJobStore>,
        factory: SyntheticSourceFactory,
        detector: MockDetector,
        config: WorkerConfig,
    ) -> Arc<JobScheduler> {
        let ctx = PipelineContext::new(Arc::new(factory), Arc::new(detector), config.clone());
        Arc::new(JobScheduler::new(config, store, ctx))
    }

    async fn wait_terminal(store: &dyn JobStore, ids: &[JobId]) {
        for _ in 0..500 {
            let mut all_done = true;
            for id in ids {
                let job = store.get_job(id).await.unwrap();
                if !job.status.is_terminal() {
                    all_done = false;
                    break;
                }
            }
            if all_done {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("jobs did not reach a terminal state in time");
    }

    #[tokio::test]
    async fn test_jobs_drain_to_completed() {
        let store = Arc::new(InMemoryJobStore::new());
        let mut ids = Vec::new();
        for i in 0..5 {
            let job = store.enqueue_job(&format!("synthetic://{i}")).await.unwrap();
            ids.push(job.id);
        }

        let scheduler = scheduler_with(
            Arc::clone(&store),
            SyntheticSourceFactory::new(10, 30.0),
            MockDetector::scripted(vec![], vec![]),
            quick_config(),
        );
        let runner = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run().await })
        };

        wait_terminal(store.as_ref(), &ids).await;
        for id in &ids {
            let job = store.get_job(id).await.unwrap();
            assert_eq!(job.status, JobStatus::Completed);
            assert!(job.finished_at.is_some());
        }

        scheduler.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_preflight_rejection_fails_from_queued() {
        let store = Arc::new(InMemoryJobStore::new());
        let job = store.enqueue_job("   ").await.unwrap();

        let scheduler = scheduler_with(
            Arc::clone(&store),
            SyntheticSourceFactory::new(10, 30.0),
            MockDetector::scripted(vec![], vec![]),
            quick_config(),
        );
        let runner = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run().await })
        };

        wait_terminal(store.as_ref(), &[job.id.clone()]).await;
        let stored = store.get_job(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored
            .error_detail
            .as_deref()
            .unwrap()
            .starts_with("preflight:"));
        // Never entered processing.
        assert!(stored.started_at.is_none());

        scheduler.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cancel_in_flight_job() {
        let store = Arc::new(InMemoryJobStore::new());
        let job = store.enqueue_job("synthetic://slow").await.unwrap();

        let scheduler = scheduler_with(
            Arc::clone(&store),
            SyntheticSourceFactory::new(10_000, 30.0)
                .with_frame_delay(Duration::from_millis(5)),
            MockDetector::scripted(vec![], vec![]),
            quick_config(),
        );
        let runner = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run().await })
        };

        // Wait until the job is claimed, then cancel it.
        let mut cancelled = false;
        for _ in 0..200 {
            if scheduler.cancel(&job.id).await {
                cancelled = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(cancelled, "job was never in flight");

        wait_terminal(store.as_ref(), &[job.id.clone()]).await;
        let stored = store.get_job(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error_detail.as_deref(), Some("cancelled"));
        assert!(stored.events.is_empty());

        scheduler.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_transient_processing_persist_outage_recovers() {
        // The job is already off the queue when the processing write
        // fails; a single blip must not strand it.
        let store: Arc<ProcessingOutageStore> = Arc::new(ProcessingOutageStore::failing(1));
        let job = store.enqueue_job("synthetic://video").await.unwrap();

        let config = quick_config();
        let ctx = PipelineContext::new(
            Arc::new(SyntheticSourceFactory::new(10, 30.0)),
            Arc::new(MockDetector::scripted(vec![], vec![])),
            config.clone(),
        );
        let scheduler = Arc::new(JobScheduler::new(
            config,
            Arc::clone(&store) as Arc<dyn JobStore>,
            ctx,
        ));
        let runner = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run().await })
        };

        wait_terminal(store.as_ref(), &[job.id.clone()]).await;
        let stored = store.get_job(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Completed);

        scheduler.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_processing_persist_exhaustion_fails_job_with_cause() {
        let store: Arc<ProcessingOutageStore> = Arc::new(ProcessingOutageStore::failing(100));
        let job = store.enqueue_job("synthetic://video").await.unwrap();

        let config = WorkerConfig {
            persist_base_delay: Duration::from_millis(1),
            ..quick_config()
        };
        let ctx = PipelineContext::new(
            Arc::new(SyntheticSourceFactory::new(10, 30.0)),
            Arc::new(MockDetector::scripted(vec![], vec![])),
            config.clone(),
        );
        let scheduler = Arc::new(JobScheduler::new(
            config,
            Arc::clone(&store) as Arc<dyn JobStore>,
            ctx,
        ));
        let runner = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run().await })
        };

        wait_terminal(store.as_ref(), &[job.id.clone()]).await;
        let stored = store.get_job(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        let detail = stored.error_detail.as_deref().unwrap();
        assert!(detail.starts_with("store:"));
        assert!(detail.contains("simulated outage"));

        scheduler.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cancel_unknown_job_is_noop() {
        let store = Arc::new(InMemoryJobStore::new());
        let scheduler = scheduler_with(
            store,
            SyntheticSourceFactory::new(10, 30.0),
            MockDetector::scripted(vec![], vec![]),
            quick_config(),
        );
        assert!(!scheduler.cancel(&JobId::new()).await);
    }
}
