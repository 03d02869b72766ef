//! Transcode job scheduler.
//!
//! Fans one uploaded source out into all ladder renditions, running the
//! encodes concurrently under a single bounded worker pool shared by
//! every submitted job. Task outcomes are tracked in an in-process
//! registry queryable by source id and rendition name.

pub mod config;
pub mod error;
pub mod registry;
pub mod scheduler;

pub use config::SchedulerConfig;
pub use error::{SchedulerError, SchedulerResult};
pub use registry::{JobRegistry, JobStatus, TaskStatus};
pub use scheduler::{JobHandle, TranscodeScheduler};
