//! Transcode job and per-rendition task state machines.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::rendition::RenditionSpec;
use crate::source_id::SourceId;

/// State of one rendition encode.
///
/// Transitions are monotonic: `Pending → Running → {Succeeded, Failed}`.
/// A terminal task never re-enters `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for a worker slot
    #[default]
    Pending,
    /// Encode in progress
    Running,
    /// Output file written
    Succeeded,
    /// Encode failed; no usable output
    Failed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }

    /// Whether a transition from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Pending, TaskState::Running)
                | (TaskState::Running, TaskState::Succeeded)
                | (TaskState::Running, TaskState::Failed)
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One rendition encode within a job.
#[derive(Debug, Clone)]
pub struct RenditionTask {
    /// The target rendition
    pub spec: &'static RenditionSpec,
    /// Where the encoded file is written
    pub output_path: PathBuf,
    /// Current state
    pub state: TaskState,
    /// Error detail once `Failed`
    pub error: Option<String>,
}

impl RenditionTask {
    pub fn new(spec: &'static RenditionSpec, output_path: PathBuf) -> Self {
        Self {
            spec,
            output_path,
            state: TaskState::Pending,
            error: None,
        }
    }
}

/// The unit of work representing "transcode this source into all
/// configured renditions".
///
/// Owned exclusively by the scheduler for its lifetime; there is no
/// persisted job record.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub source_id: SourceId,
    pub input_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub renditions: Vec<RenditionTask>,
}

impl TranscodeJob {
    /// Build a job with one task per ladder entry. `output_path_for`
    /// maps a rendition to its deterministic output location.
    pub fn new<F>(source_id: SourceId, input_path: PathBuf, output_path_for: F) -> Self
    where
        F: Fn(&'static RenditionSpec) -> PathBuf,
    {
        let renditions = RenditionSpec::ladder()
            .iter()
            .map(|spec| RenditionTask::new(spec, output_path_for(spec)))
            .collect();

        Self {
            source_id,
            input_path,
            created_at: Utc::now(),
            renditions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_transitions_are_monotonic() {
        assert!(TaskState::Pending.can_transition_to(TaskState::Running));
        assert!(TaskState::Running.can_transition_to(TaskState::Succeeded));
        assert!(TaskState::Running.can_transition_to(TaskState::Failed));

        // No terminal state re-enters Running, no skipping Pending->terminal.
        assert!(!TaskState::Succeeded.can_transition_to(TaskState::Running));
        assert!(!TaskState::Failed.can_transition_to(TaskState::Running));
        assert!(!TaskState::Pending.can_transition_to(TaskState::Succeeded));
        assert!(!TaskState::Pending.can_transition_to(TaskState::Failed));
        assert!(!TaskState::Succeeded.can_transition_to(TaskState::Failed));
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Succeeded.is_terminal());
        assert!(TaskState::Failed.is_terminal());
    }

    #[test]
    fn job_has_one_task_per_ladder_entry() {
        let id = SourceId::generate();
        let job = TranscodeJob::new(id.clone(), PathBuf::from("/tmp/in.mp4"), |spec| {
            PathBuf::from("/videos").join(spec.output_filename(&id))
        });

        assert_eq!(job.renditions.len(), RenditionSpec::ladder().len());
        for task in &job.renditions {
            assert_eq!(task.state, TaskState::Pending);
            assert!(task.error.is_none());
        }

        let mut paths: Vec<_> = job.renditions.iter().map(|t| t.output_path.clone()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), job.renditions.len());
    }
}
