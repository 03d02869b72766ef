//! Rendition ladder definitions.
//!
//! The ladder is fixed at compile time and shared read-only across all
//! jobs. Output filenames are a pure function of (source id, rendition),
//! which keeps them collision-free by construction.

use serde::Serialize;

use crate::source_id::SourceId;

/// One target output variant of a source video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenditionSpec {
    /// Unique rendition key (e.g. "high", "med")
    pub name: &'static str,
    /// Filename prefix; empty for the default (highest) rendition
    pub prefix: &'static str,
    /// Target frame height in pixels; width follows the aspect ratio
    pub target_height: u32,
    /// Video bitrate in FFmpeg rate notation (e.g. "2500k")
    pub video_bitrate: &'static str,
    /// Audio bitrate in FFmpeg rate notation
    pub audio_bitrate: &'static str,
    /// Frame rate cap; `None` keeps the source frame rate
    pub max_fps: Option<u32>,
}

/// The full rendition ladder, highest quality first.
///
/// The first entry is the default rendition served when a client does
/// not ask for a specific quality.
pub const LADDER: [RenditionSpec; 4] = [
    RenditionSpec {
        name: "high",
        prefix: "",
        target_height: 1080,
        video_bitrate: "5000k",
        audio_bitrate: "192k",
        max_fps: None,
    },
    RenditionSpec {
        name: "med",
        prefix: "med_",
        target_height: 720,
        video_bitrate: "2500k",
        audio_bitrate: "128k",
        max_fps: Some(30),
    },
    RenditionSpec {
        name: "low",
        prefix: "low_",
        target_height: 480,
        video_bitrate: "100k",
        audio_bitrate: "64k",
        max_fps: Some(30),
    },
    RenditionSpec {
        name: "verylow",
        prefix: "very_low_",
        target_height: 240,
        video_bitrate: "30k",
        audio_bitrate: "1k",
        max_fps: Some(30),
    },
];

impl RenditionSpec {
    /// All renditions produced for every uploaded source.
    pub fn ladder() -> &'static [RenditionSpec] {
        &LADDER
    }

    /// The default rendition (highest quality, unprefixed filename).
    pub fn default_rendition() -> &'static RenditionSpec {
        &LADDER[0]
    }

    /// Look up a rendition by its name.
    pub fn by_name(name: &str) -> Option<&'static RenditionSpec> {
        LADDER.iter().find(|spec| spec.name == name)
    }

    /// Deterministic output filename for a source.
    pub fn output_filename(&self, source_id: &SourceId) -> String {
        format!("{}{}.mp4", self.prefix, source_id)
    }
}
