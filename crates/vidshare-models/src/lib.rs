//! Shared data models for the vidshare backend.
//!
//! Everything here is pure data: the rendition ladder, transcode job and
//! task state machines, and source identifiers. No I/O.

pub mod job;
pub mod rendition;
pub mod source_id;

pub use job::{RenditionTask, TaskState, TranscodeJob};
pub use rendition::RenditionSpec;
pub use source_id::{InvalidSourceId, SourceId};
