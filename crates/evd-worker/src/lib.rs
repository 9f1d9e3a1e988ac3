//! Detection job scheduler and pipeline driver.
//!
//! Claims queued jobs from a [`JobStore`](evd_store::JobStore), decodes
//! frames, runs the detector heads, correlates candidates into events
//! and persists terminal results.

pub mod config;
pub mod error;
pub mod logging;
pub mod processor;
pub mod retry;
pub mod scheduler;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, JobLogger};
pub use processor::{process_job, PipelineContext};
pub use retry::{retry_async, RetryConfig, RetryResult};
pub use scheduler::JobScheduler;
