//! In-process job status registry.
//!
//! Closes the fire-and-forget visibility gap: every submitted job gets
//! a status record queryable by source id, with per-rendition state and
//! error detail, instead of callers inferring readiness from file
//! presence. In-process only; job records do not survive a restart.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::warn;

use vidshare_models::{SourceId, TaskState, TranscodeJob};

/// Status of one rendition encode.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    /// Rendition name (ladder key)
    pub rendition: String,
    /// Output filename for this rendition
    pub output_filename: String,
    /// Current task state
    pub state: TaskState,
    /// Error detail once failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Status snapshot of one transcode job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub source_id: SourceId,
    /// Submission generation for this source id. Workers stamp their
    /// transitions with it so a superseded submission's workers cannot
    /// touch the record of a later one.
    #[serde(skip)]
    pub generation: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tasks: Vec<TaskStatus>,
}

impl JobStatus {
    /// Whether every task reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(|t| t.state.is_terminal())
    }

    /// Whether every task succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.tasks.iter().all(|t| t.state == TaskState::Succeeded)
    }
}

/// Registry of job statuses, shared between the scheduler's workers and
/// status queries.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    inner: Arc<RwLock<HashMap<String, JobStatus>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly-submitted job. Replaces any previous entry
    /// for the same source id (resubmission resets status) and returns
    /// the new entry's generation, which the job's workers must pass
    /// back on every transition.
    pub async fn insert_job(&self, job: &TranscodeJob) -> u64 {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let generation = inner
            .get(job.source_id.as_str())
            .map(|prev| prev.generation + 1)
            .unwrap_or(1);
        let status = JobStatus {
            source_id: job.source_id.clone(),
            generation,
            created_at: job.created_at,
            updated_at: now,
            tasks: job
                .renditions
                .iter()
                .map(|task| TaskStatus {
                    rendition: task.spec.name.to_string(),
                    output_filename: task.spec.output_filename(&job.source_id),
                    state: TaskState::Pending,
                    error: None,
                })
                .collect(),
        };

        inner.insert(job.source_id.as_str().to_string(), status);
        generation
    }

    /// Transition a task, enforcing monotonicity: an illegal transition
    /// (e.g. terminal back to running) is dropped with a warning, and a
    /// transition stamped with a stale generation is dropped because its
    /// worker belongs to a submission that has since been replaced.
    async fn transition(
        &self,
        source_id: &SourceId,
        generation: u64,
        rendition: &str,
        next: TaskState,
        error: Option<String>,
    ) {
        let mut inner = self.inner.write().await;
        let Some(status) = inner.get_mut(source_id.as_str()) else {
            warn!(source_id = %source_id, rendition, "Transition for unknown job");
            return;
        };
        if status.generation != generation {
            warn!(
                source_id = %source_id,
                rendition,
                stale = generation,
                current = status.generation,
                "Dropping transition from superseded submission"
            );
            return;
        }
        let Some(task) = status.tasks.iter_mut().find(|t| t.rendition == rendition) else {
            warn!(source_id = %source_id, rendition, "Transition for unknown rendition");
            return;
        };

        if !task.state.can_transition_to(next) {
            warn!(
                source_id = %source_id,
                rendition,
                from = %task.state,
                to = %next,
                "Dropping illegal task transition"
            );
            return;
        }

        task.state = next;
        task.error = error;
        status.updated_at = Utc::now();
    }

    pub async fn mark_running(&self, source_id: &SourceId, generation: u64, rendition: &str) {
        self.transition(source_id, generation, rendition, TaskState::Running, None)
            .await;
    }

    pub async fn mark_succeeded(&self, source_id: &SourceId, generation: u64, rendition: &str) {
        self.transition(source_id, generation, rendition, TaskState::Succeeded, None)
            .await;
    }

    pub async fn mark_failed(
        &self,
        source_id: &SourceId,
        generation: u64,
        rendition: &str,
        error: &str,
    ) {
        self.transition(
            source_id,
            generation,
            rendition,
            TaskState::Failed,
            Some(error.to_string()),
        )
        .await;
    }

    /// Snapshot of one job's status.
    pub async fn get(&self, source_id: &SourceId) -> Option<JobStatus> {
        self.inner.read().await.get(source_id.as_str()).cloned()
    }

    /// Snapshot of one rendition's status within a job.
    pub async fn get_task(&self, source_id: &SourceId, rendition: &str) -> Option<TaskStatus> {
        self.inner
            .read()
            .await
            .get(source_id.as_str())
            .and_then(|s| s.tasks.iter().find(|t| t.rendition == rendition).cloned())
    }

    /// Remove a job's record (after its files are deleted).
    pub async fn remove(&self, source_id: &SourceId) -> Option<JobStatus> {
        self.inner.write().await.remove(source_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use vidshare_models::RenditionSpec;

    fn test_job(id: &SourceId) -> TranscodeJob {
        TranscodeJob::new(id.clone(), PathBuf::from("/tmp/in.mp4"), |spec| {
            PathBuf::from("/videos").join(spec.output_filename(id))
        })
    }

    #[tokio::test]
    async fn insert_registers_all_tasks_pending() {
        let registry = JobRegistry::new();
        let id = SourceId::generate();
        registry.insert_job(&test_job(&id)).await;

        let status = registry.get(&id).await.unwrap();
        assert_eq!(status.tasks.len(), RenditionSpec::ladder().len());
        assert!(status.tasks.iter().all(|t| t.state == TaskState::Pending));
        assert!(!status.is_complete());
    }

    #[tokio::test]
    async fn full_lifecycle_is_tracked() {
        let registry = JobRegistry::new();
        let id = SourceId::generate();
        let gen = registry.insert_job(&test_job(&id)).await;

        for spec in RenditionSpec::ladder() {
            registry.mark_running(&id, gen, spec.name).await;
        }
        registry.mark_succeeded(&id, gen, "high").await;
        registry.mark_succeeded(&id, gen, "med").await;
        registry.mark_failed(&id, gen, "low", "disk full").await;
        registry.mark_succeeded(&id, gen, "verylow").await;

        let status = registry.get(&id).await.unwrap();
        assert!(status.is_complete());
        assert!(!status.all_succeeded());

        let low = registry.get_task(&id, "low").await.unwrap();
        assert_eq!(low.state, TaskState::Failed);
        assert_eq!(low.error.as_deref(), Some("disk full"));
    }

    #[tokio::test]
    async fn terminal_tasks_never_reenter_running() {
        let registry = JobRegistry::new();
        let id = SourceId::generate();
        let gen = registry.insert_job(&test_job(&id)).await;

        registry.mark_running(&id, gen, "high").await;
        registry.mark_succeeded(&id, gen, "high").await;
        registry.mark_running(&id, gen, "high").await;
        registry.mark_failed(&id, gen, "high", "late failure").await;

        let high = registry.get_task(&id, "high").await.unwrap();
        assert_eq!(high.state, TaskState::Succeeded);
        assert!(high.error.is_none());
    }

    #[tokio::test]
    async fn resubmission_replaces_the_record() {
        let registry = JobRegistry::new();
        let id = SourceId::generate();
        let gen = registry.insert_job(&test_job(&id)).await;
        registry.mark_running(&id, gen, "high").await;
        registry.mark_succeeded(&id, gen, "high").await;

        registry.insert_job(&test_job(&id)).await;
        let high = registry.get_task(&id, "high").await.unwrap();
        assert_eq!(high.state, TaskState::Pending);
    }

    #[tokio::test]
    async fn superseded_workers_cannot_touch_the_fresh_record() {
        let registry = JobRegistry::new();
        let id = SourceId::generate();
        let first = registry.insert_job(&test_job(&id)).await;
        registry.mark_running(&id, first, "high").await;

        // A resubmission replaces the record while the first
        // submission's workers are still running.
        let second = registry.insert_job(&test_job(&id)).await;
        assert!(second > first);

        // Late outcomes from the first submission are dropped.
        registry.mark_running(&id, first, "high").await;
        registry.mark_failed(&id, first, "high", "stale failure").await;
        let high = registry.get_task(&id, "high").await.unwrap();
        assert_eq!(high.state, TaskState::Pending);

        // The fresh submission's workers still own the record.
        registry.mark_running(&id, second, "high").await;
        registry.mark_succeeded(&id, second, "high").await;
        let high = registry.get_task(&id, "high").await.unwrap();
        assert_eq!(high.state, TaskState::Succeeded);
    }
}
