//! The encoder adapter: one rendition in, one output file out.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use vidshare_models::RenditionSpec;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Performs one encode of `input` into `output` per `spec`.
///
/// Object-safe so the scheduler can hold `Arc<dyn Encoder>` and tests
/// can substitute instrumented implementations.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Encode one rendition. On any error the caller must treat
    /// `output` as unusable; implementations remove partial artifacts
    /// before returning.
    async fn encode(
        &self,
        input: &Path,
        spec: &RenditionSpec,
        output: &Path,
    ) -> MediaResult<()>;
}

/// FFmpeg-backed encoder.
///
/// Scales to the rendition's target height preserving aspect ratio,
/// caps the frame rate when the spec asks for it, and re-encodes video
/// (libx264) and audio (aac) at the spec's bitrates.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEncoder {
    timeout: Option<Duration>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill encodes that exceed this wall-clock duration.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Kill in-flight encodes when the channel flips to `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    fn runner(&self) -> FfmpegRunner {
        let mut runner = FfmpegRunner::new();
        if let Some(timeout) = self.timeout {
            runner = runner.with_timeout(timeout);
        }
        if let Some(rx) = self.cancel_rx.clone() {
            runner = runner.with_cancel(rx);
        }
        runner
    }
}

/// Build the FFmpeg invocation for one rendition.
pub(crate) fn build_encode_command(
    input: &Path,
    spec: &RenditionSpec,
    output: &Path,
) -> FfmpegCommand {
    let mut cmd = FfmpegCommand::new(input, output)
        .scale_height(spec.target_height)
        .video_codec("libx264")
        .video_bitrate(spec.video_bitrate)
        .audio_codec("aac")
        .audio_bitrate(spec.audio_bitrate);

    if let Some(fps) = spec.max_fps {
        cmd = cmd.frame_rate(fps);
    }

    cmd
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(
        &self,
        input: &Path,
        spec: &RenditionSpec,
        output: &Path,
    ) -> MediaResult<()> {
        if !input.is_file() {
            return Err(MediaError::SourceUnreadable(input.to_path_buf()));
        }

        debug!(
            rendition = spec.name,
            height = spec.target_height,
            input = %input.display(),
            "Encoding rendition"
        );

        let cmd = build_encode_command(input, spec, output);
        let result = self.runner().run(&cmd).await;

        if result.is_err() {
            // No usable output on failure.
            let _ = tokio::fs::remove_file(output).await;
        }

        result
    }
}
