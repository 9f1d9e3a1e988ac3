//! Reference worker binary.
//!
//! Runs the scheduler against an in-memory store with the synthetic
//! frame source and the seeded mock detector. Useful for exercising the
//! whole pipeline without FFmpeg or model weights.

use std::sync::Arc;

use tracing::info;

use evd_detect::{MockDetector, MockDetectorConfig};
use evd_media::SyntheticSourceFactory;
use evd_store::{InMemoryJobStore, JobStore};
use evd_worker::{init_tracing, JobScheduler, PipelineContext, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = WorkerConfig::from_env();
    info!(
        workers = config.workers,
        stride = config.sampling.frame_stride,
        "Starting reference detection worker"
    );

    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    for i in 0..4 {
        let job = store.enqueue_job(&format!("synthetic://demo/{i}")).await?;
        info!(job_id = %job.id, "Enqueued demo job");
    }

    let ctx = PipelineContext::new(
        Arc::new(SyntheticSourceFactory::new(300, 30.0)),
        Arc::new(MockDetector::seeded(MockDetectorConfig::default())),
        config.clone(),
    );
    let scheduler = Arc::new(JobScheduler::new(config, Arc::clone(&store), ctx));

    let runner = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run().await })
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    scheduler.shutdown();
    runner.await??;

    Ok(())
}
