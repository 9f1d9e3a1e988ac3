//! Single-job detection pipeline.
//!
//! Pulls frames lazily from the source, runs both detector heads per
//! frame, feeds candidates through the correlator and returns the
//! finalized events. Cancellation and the wall-clock budget are
//! checked between frames so a job never stops mid-frame.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::debug;

use evd_detect::{validate_candidates, Correlator, DetectorAdapter};
use evd_media::FrameSourceFactory;
use evd_models::{Event, Job, TimeRange};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// Shared collaborators handed to every job.
#[derive(Clone)]
pub struct PipelineContext {
    pub source_factory: Arc<dyn FrameSourceFactory>,
    pub detector: Arc<dyn DetectorAdapter>,
    pub config: WorkerConfig,
}

impl PipelineContext {
    pub fn new(
        source_factory: Arc<dyn FrameSourceFactory>,
        detector: Arc<dyn DetectorAdapter>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            source_factory,
            detector,
            config,
        }
    }
}

/// Run the detection pipeline for one job.
///
/// Returns the correlated events on success. A `true` observed on the
/// cancellation channel between frames aborts with
/// [`WorkerError::Cancelled`]; exceeding the wall-clock budget aborts
/// with [`WorkerError::Timeout`] through the same check point.
pub async fn process_job(
    ctx: &PipelineContext,
    job: &Job,
    cancel: watch::Receiver<bool>,
) -> WorkerResult<Vec<Event>> {
    let logger = JobLogger::new(&job.id, "pipeline");
    let started = Instant::now();

    let mut source = ctx
        .source_factory
        .open(&job.media_reference, &ctx.config.sampling)
        .await?;
    logger.log_start(&format!(
        "opened {} via {}",
        job.media_reference,
        source.name()
    ));

    let mut correlator = Correlator::new(ctx.config.correlator.clone());
    let mut prev_timestamp = 0.0f64;
    let mut frames_processed = 0u64;

    loop {
        if *cancel.borrow() {
            logger.log_warning(&format!("cancelled after {} frames", frames_processed));
            return Err(WorkerError::Cancelled);
        }
        if started.elapsed() >= ctx.config.job_timeout {
            logger.log_warning(&format!(
                "wall-clock budget exhausted after {} frames",
                frames_processed
            ));
            return Err(WorkerError::Timeout(ctx.config.job_timeout));
        }

        let frame = match source.next_frame().await? {
            Some(frame) => frame,
            None => break,
        };

        // The audio segment for this step spans from the previous
        // sampled frame up to the current one.
        let segment = TimeRange::new(prev_timestamp, frame.timestamp);
        prev_timestamp = frame.timestamp;

        let sirens = ctx.detector.detect_siren(segment).await?;
        validate_candidates(&sirens)?;
        let vehicles = ctx.detector.detect_vehicles(&frame).await?;
        validate_candidates(&vehicles)?;

        for candidate in sirens.iter().chain(vehicles.iter()) {
            correlator.push(candidate);
        }

        frames_processed += 1;
        if frames_processed % 100 == 0 {
            logger.log_progress(&format!("{} frames processed", frames_processed));
        }
    }

    let events = correlator.finish();
    debug!(
        job_id = %job.id,
        frames = frames_processed,
        events = events.len(),
        "pipeline finished"
    );
    Ok(events)
}
