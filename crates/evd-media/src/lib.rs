//! Media decoding for the EVD pipeline.
//!
//! Wraps the FFmpeg CLI tools to turn an uploaded video or still image
//! into a lazy, pull-based sequence of timestamped frames, plus a
//! deterministic synthetic source for tests.

pub mod error;
pub mod probe;
pub mod source;
pub mod synthetic;

pub use error::{MediaError, MediaResult};
pub use probe::{probe_media, MediaInfo};
pub use source::{
    FfmpegFrameSource, FfmpegSourceFactory, FrameSource, FrameSourceFactory, SamplingConfig,
};
pub use synthetic::{SyntheticFrameSource, SyntheticSourceFactory};
