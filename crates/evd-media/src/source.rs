//! Pull-based frame sources.
//!
//! A frame source decodes a media reference into a lazy, forward-only
//! sequence of timestamped frames. Backpressure is inherent: the next
//! frame is only decoded when the consumer asks for it, so at most one
//! frame (plus the decoder's own pipe buffer) is materialized ahead of
//! the pipeline.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

use evd_models::Frame;

use crate::error::{MediaError, MediaResult};
use crate::probe::probe_media;

/// Frame sampling configuration.
#[derive(Debug, Clone)]
pub struct SamplingConfig {
    /// Keep every n-th decoded frame (1 = every frame).
    pub frame_stride: u32,
    /// Stop after this many sampled frames (0 = unbounded).
    pub max_frames: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            frame_stride: 5,
            max_frames: 0,
        }
    }
}

impl SamplingConfig {
    /// Sampling for still-image submissions: a single frame.
    pub fn single_frame() -> Self {
        Self {
            frame_stride: 1,
            max_frames: 1,
        }
    }
}

/// A lazy, forward-only, finite sequence of frames.
///
/// Not restartable: once exhausted or aborted, a fresh source must be
/// opened to re-scan the media.
#[async_trait]
pub trait FrameSource: Send + std::fmt::Debug {
    /// Pull the next frame.
    ///
    /// Returns `Ok(None)` when the stream is exhausted. A decode failure
    /// surfaces as [`MediaError::MediaUnreadable`] and aborts the
    /// sequence; frames already yielded remain valid.
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>>;

    /// Source name for logging.
    fn name(&self) -> &'static str;
}

/// Opens a frame source for a media reference.
///
/// The scheduler owns one factory and opens a fresh source per job.
#[async_trait]
pub trait FrameSourceFactory: Send + Sync {
    async fn open(
        &self,
        media_reference: &str,
        sampling: &SamplingConfig,
    ) -> MediaResult<Box<dyn FrameSource>>;
}

/// FFmpeg-backed frame source.
///
/// Spawns `ffmpeg` decoding to rgb24 rawvideo on stdout and reads one
/// frame per [`FrameSource::next_frame`] call.
#[derive(Debug)]
pub struct FfmpegFrameSource {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_task: Option<tokio::task::JoinHandle<String>>,
    path: PathBuf,
    width: u32,
    height: u32,
    fps: f64,
    stride: u32,
    max_frames: u64,
    next_index: u64,
    done: bool,
}

impl FfmpegFrameSource {
    /// Open a media file for decoding.
    pub async fn open(path: impl AsRef<Path>, sampling: &SamplingConfig) -> MediaResult<Self> {
        let path = path.as_ref();
        let info = probe_media(path).await?;

        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let stride = sampling.frame_stride.max(1);
        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(path)
            .args([
                "-vf",
                &format!("framestep={}", stride),
                "-pix_fmt",
                "rgb24",
                "-f",
                "rawvideo",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::unreadable(format!("failed to spawn ffmpeg: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::unreadable("failed to capture ffmpeg stdout"))?;

        // Drain stderr on a side task so the decoder never blocks on a
        // full pipe; the collected output feeds error reporting.
        let stderr = child.stderr.take();
        let stderr_task = stderr.map(|mut s| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                s.read_to_end(&mut buf).await.ok();
                String::from_utf8_lossy(&buf).to_string()
            })
        });

        debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            stride,
            "Opened ffmpeg frame source"
        );

        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            stderr_task,
            path: path.to_path_buf(),
            width: info.width,
            height: info.height,
            fps: info.fps,
            stride,
            max_frames: sampling.max_frames,
            next_index: 0,
            done: false,
        })
    }

    fn bytes_per_frame(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Timestamp of the n-th sampled frame within the original media.
    fn timestamp_for(&self, index: u64) -> f64 {
        (index * self.stride as u64) as f64 / self.fps
    }

    async fn collect_stderr(&mut self) -> String {
        match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        }
    }

    async fn finish_stream(&mut self) -> MediaResult<()> {
        self.done = true;
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| MediaError::unreadable(format!("ffmpeg wait failed: {}", e)))?;
        if !status.success() {
            let stderr = self.collect_stderr().await;
            return Err(MediaError::unreadable_with_stderr(
                format!(
                    "ffmpeg exited with {:?} decoding {}",
                    status.code(),
                    self.path.display()
                ),
                stderr,
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        if self.done {
            return Ok(None);
        }

        if self.max_frames > 0 && self.next_index >= self.max_frames {
            self.done = true;
            if let Err(e) = self.child.start_kill() {
                warn!(path = %self.path.display(), "Failed to stop ffmpeg: {}", e);
            }
            self.child.wait().await.ok();
            return Ok(None);
        }

        let mut buf = vec![0u8; self.bytes_per_frame()];
        match self.stdout.read_exact(&mut buf).await {
            Ok(_) => {
                let index = self.next_index;
                self.next_index += 1;
                let frame = Frame::new(
                    index,
                    self.timestamp_for(index),
                    buf,
                    self.width,
                    self.height,
                );
                Ok(Some(frame))
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // End of stream, or the decoder died mid-frame. The exit
                // status tells which.
                self.finish_stream().await?;
                Ok(None)
            }
            Err(e) => {
                self.done = true;
                Err(MediaError::unreadable(format!(
                    "failed to read frame {} from ffmpeg: {}",
                    self.next_index, e
                )))
            }
        }
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Factory producing [`FfmpegFrameSource`] for filesystem references.
#[derive(Debug, Default, Clone)]
pub struct FfmpegSourceFactory;

#[async_trait]
impl FrameSourceFactory for FfmpegSourceFactory {
    async fn open(
        &self,
        media_reference: &str,
        sampling: &SamplingConfig,
    ) -> MediaResult<Box<dyn FrameSource>> {
        let source = FfmpegFrameSource::open(media_reference, sampling).await?;
        Ok(Box::new(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_defaults() {
        let sampling = SamplingConfig::default();
        assert_eq!(sampling.frame_stride, 5);
        assert_eq!(sampling.max_frames, 0);

        let single = SamplingConfig::single_frame();
        assert_eq!(single.max_frames, 1);
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let err = FfmpegFrameSource::open("/nonexistent/clip.mp4", &SamplingConfig::default())
            .await
            .unwrap_err();
        assert!(err.is_unreadable());
    }

    #[tokio::test]
    async fn test_factory_missing_file() {
        let factory = FfmpegSourceFactory;
        let err = factory
            .open("/nonexistent/clip.mp4", &SamplingConfig::default())
            .await
            .unwrap_err();
        assert!(err.is_unreadable());
    }
}
