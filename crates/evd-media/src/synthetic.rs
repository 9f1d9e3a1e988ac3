//! Deterministic synthetic frame source.
//!
//! Used by the reference pipeline and tests: yields fixed-size frames at
//! a fixed rate without touching FFmpeg, with optional mid-stream decode
//! failure injection.

use std::time::Duration;

use async_trait::async_trait;

use evd_models::Frame;

use crate::error::{MediaError, MediaResult};
use crate::source::{FrameSource, FrameSourceFactory, SamplingConfig};

const SYNTHETIC_WIDTH: u32 = 8;
const SYNTHETIC_HEIGHT: u32 = 8;

/// Synthetic frame source yielding `total_frames` frames.
#[derive(Debug)]
pub struct SyntheticFrameSource {
    total_frames: u64,
    fps: f64,
    stride: u32,
    max_frames: u64,
    /// Yield this many frames, then fail with `MediaUnreadable`.
    fail_after: Option<u64>,
    /// Simulated per-frame decode latency.
    frame_delay: Duration,
    next_index: u64,
    done: bool,
}

impl SyntheticFrameSource {
    pub fn new(total_frames: u64, fps: f64, sampling: &SamplingConfig) -> Self {
        Self {
            total_frames,
            fps,
            stride: sampling.frame_stride.max(1),
            max_frames: sampling.max_frames,
            fail_after: None,
            frame_delay: Duration::ZERO,
            next_index: 0,
            done: false,
        }
    }

    /// Inject a decode failure after `n` frames have been yielded.
    pub fn with_fail_after(mut self, n: u64) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Simulate decode latency per frame.
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }
}

#[async_trait]
impl FrameSource for SyntheticFrameSource {
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        if self.done {
            return Ok(None);
        }

        if let Some(n) = self.fail_after {
            if self.next_index >= n {
                self.done = true;
                return Err(MediaError::unreadable(format!(
                    "synthetic decode failure after {} frames",
                    n
                )));
            }
        }

        let sampled_total = self.total_frames.div_ceil(self.stride as u64);
        let limit = if self.max_frames > 0 {
            sampled_total.min(self.max_frames)
        } else {
            sampled_total
        };
        if self.next_index >= limit {
            self.done = true;
            return Ok(None);
        }

        if !self.frame_delay.is_zero() {
            tokio::time::sleep(self.frame_delay).await;
        }

        let index = self.next_index;
        self.next_index += 1;

        // Flat gray buffer keyed by index so frames are distinguishable.
        let pixel = (index % 251) as u8;
        let image = vec![pixel; (SYNTHETIC_WIDTH * SYNTHETIC_HEIGHT * 3) as usize];
        let timestamp = (index * self.stride as u64) as f64 / self.fps;

        Ok(Some(Frame::new(
            index,
            timestamp,
            image,
            SYNTHETIC_WIDTH,
            SYNTHETIC_HEIGHT,
        )))
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

/// Factory producing synthetic sources regardless of media reference.
#[derive(Debug, Clone)]
pub struct SyntheticSourceFactory {
    pub total_frames: u64,
    pub fps: f64,
    pub fail_after: Option<u64>,
    pub frame_delay: Duration,
}

impl SyntheticSourceFactory {
    pub fn new(total_frames: u64, fps: f64) -> Self {
        Self {
            total_frames,
            fps,
            fail_after: None,
            frame_delay: Duration::ZERO,
        }
    }

    pub fn with_fail_after(mut self, n: u64) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }
}

#[async_trait]
impl FrameSourceFactory for SyntheticSourceFactory {
    async fn open(
        &self,
        _media_reference: &str,
        sampling: &SamplingConfig,
    ) -> MediaResult<Box<dyn FrameSource>> {
        let mut source = SyntheticFrameSource::new(self.total_frames, self.fps, sampling);
        if let Some(n) = self.fail_after {
            source = source.with_fail_after(n);
        }
        source = source.with_frame_delay(self.frame_delay);
        Ok(Box::new(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_yields_all_frames_in_order() {
        let sampling = SamplingConfig {
            frame_stride: 1,
            max_frames: 0,
        };
        let mut source = SyntheticFrameSource::new(5, 10.0, &sampling);

        let mut timestamps = Vec::new();
        while let Some(frame) = source.next_frame().await.unwrap() {
            assert!(frame.is_well_formed());
            timestamps.push(frame.timestamp);
        }
        assert_eq!(timestamps.len(), 5);
        assert!(timestamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_stride_and_max_frames() {
        let sampling = SamplingConfig {
            frame_stride: 2,
            max_frames: 3,
        };
        let mut source = SyntheticFrameSource::new(100, 10.0, &sampling);

        let mut frames = Vec::new();
        while let Some(frame) = source.next_frame().await.unwrap() {
            frames.push(frame);
        }
        assert_eq!(frames.len(), 3);
        // Stride 2 at 10 fps: samples land 0.2s apart.
        assert!((frames[1].timestamp - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fail_after_yields_then_errors() {
        let sampling = SamplingConfig {
            frame_stride: 1,
            max_frames: 0,
        };
        let mut source = SyntheticFrameSource::new(100, 10.0, &sampling).with_fail_after(3);

        for _ in 0..3 {
            assert!(source.next_frame().await.unwrap().is_some());
        }
        let err = source.next_frame().await.unwrap_err();
        assert!(err.is_unreadable());

        // Aborted sequences stay finished.
        assert!(source.next_frame().await.unwrap().is_none());
    }
}
