//! Worker configuration.

use std::time::Duration;

use evd_detect::CorrelatorConfig;
use evd_media::SamplingConfig;

/// Scheduler and pipeline configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Worker pool size (concurrent jobs)
    pub workers: usize,
    /// Per-job wall-clock budget
    pub job_timeout: Duration,
    /// How long an idle worker waits before polling the queue again
    pub poll_interval: Duration,
    /// Frame sampling applied to every job
    pub sampling: SamplingConfig,
    /// Correlation tuning
    pub correlator: CorrelatorConfig,
    /// Persistence retry attempts before giving up
    pub persist_retries: u32,
    /// Base delay for persistence retry backoff
    pub persist_base_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            job_timeout: Duration::from_secs(600),
            poll_interval: Duration::from_millis(100),
            sampling: SamplingConfig::default(),
            correlator: CorrelatorConfig::default(),
            persist_retries: 3,
            persist_base_delay: Duration::from_millis(100),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            workers: env_parse("EVD_WORKERS", defaults.workers),
            job_timeout: Duration::from_secs(env_parse(
                "EVD_JOB_TIMEOUT_SECS",
                defaults.job_timeout.as_secs(),
            )),
            poll_interval: Duration::from_millis(env_parse(
                "EVD_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )),
            sampling: SamplingConfig {
                frame_stride: env_parse("EVD_FRAME_STRIDE", defaults.sampling.frame_stride),
                max_frames: env_parse("EVD_MAX_FRAMES", defaults.sampling.max_frames),
            },
            correlator: CorrelatorConfig {
                window_secs: env_parse("EVD_WINDOW_SECS", defaults.correlator.window_secs),
                vehicle_threshold: env_parse(
                    "EVD_VEHICLE_THRESHOLD",
                    defaults.correlator.vehicle_threshold,
                ),
                siren_threshold: env_parse(
                    "EVD_SIREN_THRESHOLD",
                    defaults.correlator.siren_threshold,
                ),
                merge_gap_secs: env_parse("EVD_MERGE_GAP_SECS", defaults.correlator.merge_gap_secs),
            },
            persist_retries: env_parse("EVD_PERSIST_RETRIES", defaults.persist_retries),
            persist_base_delay: Duration::from_millis(env_parse(
                "EVD_PERSIST_BASE_DELAY_MS",
                defaults.persist_base_delay.as_millis() as u64,
            )),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
