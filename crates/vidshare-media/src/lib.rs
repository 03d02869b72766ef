//! FFmpeg CLI wrapper for rendition encoding.
//!
//! This crate owns the encoder adapter: building FFmpeg invocations for
//! a target rendition, running them with timeout and cancellation, and
//! probing media files with ffprobe. Orchestration lives in
//! `vidshare-scheduler`; nothing here knows about jobs or the pool.

pub mod command;
pub mod encoder;
pub mod error;
pub mod probe;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use encoder::{Encoder, FfmpegEncoder};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_video, VideoInfo};
