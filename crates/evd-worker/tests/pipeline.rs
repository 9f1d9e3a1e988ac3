//! End-to-end scheduler tests over the in-memory store, the synthetic
//! frame source and mock detectors.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use evd_detect::{DetectError, DetectResult, DetectorAdapter, MockDetector};
use evd_media::{SamplingConfig, SyntheticSourceFactory};
use evd_models::{Candidate, Event, Frame, JobId, JobStatus, TimeRange};
use evd_store::{InMemoryJobStore, JobStore, StoreError, StoreResult};
use evd_worker::{JobScheduler, PipelineContext, WorkerConfig};

fn quick_config(workers: usize) -> WorkerConfig {
    WorkerConfig {
        workers,
        poll_interval: Duration::from_millis(10),
        persist_base_delay: Duration::from_millis(5),
        sampling: SamplingConfig {
            frame_stride: 1,
            max_frames: 0,
        },
        ..WorkerConfig::default()
    }
}

async fn wait_terminal(store: &dyn JobStore, ids: &[JobId]) {
    for _ in 0..1000 {
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

/// Detector that tracks how many frames are being inspected
/// concurrently across all jobs.
struct TrackingDetector {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl TrackingDetector {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DetectorAdapter for TrackingDetector {
    async fn detect_vehicles(&self, _frame: &Frame) -> DetectResult<Vec<Candidate>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![])
    }

    async fn detect_siren(&self, _segment: TimeRange) -> DetectResult<Vec<Candidate>> {
        Ok(vec![])
    }

    fn name(&self) -> &'static str {
        "tracking"
    }
}

/// Store wrapper that rejects the first few persistence calls for
/// terminal states.
struct FlakyStore {
    inner: InMemoryJobStore,
    failures_left: AtomicU32,
    persist_calls: AtomicU32,
}

impl FlakyStore {
    fn failing(n: u32) -> Self {
        Self {
            inner: InMemoryJobStore::new(),
            failures_left: AtomicU32::new(n),
            persist_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl JobStore for FlakyStore {
    async fn enqueue_job(&self, media_reference: &str) -> StoreResult<evd_models::Job> {
        self.inner.enqueue_job(media_reference).await
    }

    async fn claim_next_queued(&self) -> StoreResult<Option<evd_models::Job>> {
        self.inner.claim_next_queued().await
    }

    async fn persist_result(
        &self,
        job_id: &JobId,
        status: JobStatus,
        events: Vec<Event>,
        error_detail: Option<String>,
    ) -> StoreResult<()> {
        if status.is_terminal() {
            self.persist_calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(StoreError::StoreUnavailable(
                    "simulated outage".to_string(),
                ));
            }
        }
        self.inner
            .persist_result(job_id, status, events, error_detail)
            .await
    }

    async fn get_job(&self, job_id: &JobId) -> StoreResult<evd_models::Job> {
        self.inner.get_job(job_id).await
    }
}

#[tokio::test]
async fn test_many_jobs_bounded_concurrency() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let detector = Arc::new(TrackingDetector::new());
    let config = quick_config(2);

    let mut ids = Vec::new();
    for i in 0..8 {
        let job = store.enqueue_job(&format!("synthetic://{i}")).await.unwrap();
        ids.push(job.id);
    }

    let ctx = PipelineContext::new(
        Arc::new(SyntheticSourceFactory::new(20, 30.0)),
        Arc::clone(&detector) as Arc<dyn DetectorAdapter>,
        config.clone(),
    );
    let scheduler = Arc::new(JobScheduler::new(config, Arc::clone(&store), ctx));
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run().await })
    };

    wait_terminal(store.as_ref(), &ids).await;
    for id in &ids {
        let job = store.get_job(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }
    // Two workers means at most two frames inspected at once.
    assert!(detector.peak.load(Ordering::SeqCst) <= 2);

    scheduler.shutdown();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_decode_failure_fails_job_without_events() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let job = store.enqueue_job("synthetic://corrupt").await.unwrap();

    let config = quick_config(1);
    let ctx = PipelineContext::new(
        Arc::new(SyntheticSourceFactory::new(20, 30.0).with_fail_after(3)),
        Arc::new(MockDetector::scripted(vec![], vec![])),
        config.clone(),
    );
    let scheduler = Arc::new(JobScheduler::new(config, Arc::clone(&store), ctx));
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
        .starts_with("frame_source:"));
    assert!(stored.events.is_empty());

    scheduler.shutdown();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_detector_outage_fails_job() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let job = store.enqueue_job("synthetic://video").await.unwrap();

    let config = quick_config(1);
    let ctx = PipelineContext::new(
        Arc::new(SyntheticSourceFactory::new(20, 30.0)),
        Arc::new(MockDetector::unavailable("model not loaded")),
        config.clone(),
    );
    let scheduler = Arc::new(JobScheduler::new(config, Arc::clone(&store), ctx));
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run().await })
    };

    wait_terminal(store.as_ref(), &[job.id.clone()]).await;
    let stored = store.get_job(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    let detail = stored.error_detail.as_deref().unwrap();
    assert!(detail.starts_with("detector:"));
    assert!(detail.contains("model not loaded"));

    scheduler.shutdown();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_timeout_records_cancellation_detail() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let job = store.enqueue_job("synthetic://long").await.unwrap();

    let config = WorkerConfig {
        job_timeout: Duration::from_millis(30),
        ..quick_config(1)
    };
    let ctx = PipelineContext::new(
        Arc::new(
            SyntheticSourceFactory::new(10_000, 30.0).with_frame_delay(Duration::from_millis(5)),
        ),
        Arc::new(MockDetector::scripted(vec![], vec![])),
        config.clone(),
    );
    let scheduler = Arc::new(JobScheduler::new(config, Arc::clone(&store), ctx));
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
        .starts_with("cancelled"));
    assert!(stored.events.is_empty());

    scheduler.shutdown();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_persistence_retries_through_transient_outage() {
    let flaky = Arc::new(FlakyStore::failing(2));
    let store: Arc<dyn JobStore> = flaky.clone();
    let job = store.enqueue_job("synthetic://video").await.unwrap();

    let config = quick_config(1);
    let ctx = PipelineContext::new(
        Arc::new(SyntheticSourceFactory::new(10, 30.0)),
        Arc::new(MockDetector::scripted(vec![], vec![])),
        config.clone(),
    );
    let scheduler = Arc::new(JobScheduler::new(config, Arc::clone(&store), ctx));
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run().await })
    };

    wait_terminal(store.as_ref(), &[job.id.clone()]).await;
    let stored = store.get_job(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    // Two failed attempts plus the successful one.
    assert_eq!(flaky.persist_calls.load(Ordering::SeqCst), 3);

    scheduler.shutdown();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_completed_persist_exhaustion_fails_job() {
    // More failures than retries for the completed write; the fallback
    // failed write then goes through.
    let flaky = Arc::new(FlakyStore::failing(4));
    let store: Arc<dyn JobStore> = flaky.clone();
    let job = store.enqueue_job("synthetic://video").await.unwrap();

    let config = quick_config(1);
    let ctx = PipelineContext::new(
        Arc::new(SyntheticSourceFactory::new(10, 30.0)),
        Arc::new(MockDetector::scripted(vec![], vec![])),
        config.clone(),
    );
    let scheduler = Arc::new(JobScheduler::new(config, Arc::clone(&store), ctx));
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
        .starts_with("store:"));

    scheduler.shutdown();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_seeded_pipeline_is_deterministic_across_runs() {
    let mut outputs = Vec::new();
    for _ in 0..2 {
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        let job = store.enqueue_job("synthetic://video").await.unwrap();

        let config = quick_config(1);
        let ctx = PipelineContext::new(
            Arc::new(SyntheticSourceFactory::new(90, 30.0)),
            Arc::new(MockDetector::seeded(Default::default())),
            config.clone(),
        );
        let scheduler = Arc::new(JobScheduler::new(config, Arc::clone(&store), ctx));
        let runner = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run().await })
        };

        wait_terminal(store.as_ref(), &[job.id.clone()]).await;
        let stored = store.get_job(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        outputs.push(serde_json::to_string(&stored.events).unwrap());

        scheduler.shutdown();
        runner.await.unwrap().unwrap();
    }
    assert_eq!(outputs[0], outputs[1]);
}
