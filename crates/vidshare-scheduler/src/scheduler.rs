//! The transcode scheduler: bounded fan-out of rendition encodes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use vidshare_media::Encoder;
use vidshare_models::{SourceId, TranscodeJob};
use vidshare_storage::MediaStore;

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::registry::JobRegistry;

/// Handle to a submitted job.
///
/// Submission is fire-and-forget; the handle exists so tests and
/// shutdown logic can await completion. Dropping it never cancels the
/// encodes.
#[derive(Debug)]
pub struct JobHandle {
    pub source_id: SourceId,
    handles: Vec<JoinHandle<()>>,
}

impl JobHandle {
    /// Wait until every rendition task of this job reached a terminal
    /// state.
    pub async fn wait(self) {
        for result in futures_util::future::join_all(self.handles).await {
            if let Err(e) = result {
                warn!(source_id = %self.source_id, "Rendition task panicked: {e}");
            }
        }
    }
}

/// Fans each submitted source out into one encode per ladder rendition.
///
/// All encodes across all jobs share one fixed-size worker pool (a
/// semaphore owned here, constructed once at process start); excess
/// tasks queue on the semaphore until a slot frees up. A failing
/// rendition never affects its siblings, so partial success is a valid
/// end state.
pub struct TranscodeScheduler {
    config: SchedulerConfig,
    encoder: Arc<dyn Encoder>,
    store: MediaStore,
    registry: JobRegistry,
    pool: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl TranscodeScheduler {
    /// Create a new scheduler owning its worker pool.
    pub fn new(config: SchedulerConfig, encoder: Arc<dyn Encoder>, store: MediaStore) -> Self {
        let pool = Arc::new(Semaphore::new(config.max_concurrent_encodes));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            encoder,
            store,
            registry: JobRegistry::new(),
            pool,
            shutdown,
        }
    }

    /// The job status registry, shared with status queries.
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Submit a source for transcoding into all ladder renditions.
    ///
    /// Returns as soon as the job is registered and its tasks are
    /// spawned; encoding happens off the caller's path. Encode-time
    /// failures never surface here — they terminate only the failing
    /// rendition task and are recorded in the registry.
    pub async fn submit(
        &self,
        source_id: SourceId,
        input_path: impl Into<std::path::PathBuf>,
    ) -> SchedulerResult<JobHandle> {
        if *self.shutdown.borrow() {
            return Err(SchedulerError::ShutDown);
        }

        let job = TranscodeJob::new(source_id.clone(), input_path.into(), |spec| {
            self.store.output_path(&source_id, spec)
        });
        let generation = self.registry.insert_job(&job).await;

        info!(
            source_id = %job.source_id,
            renditions = job.renditions.len(),
            "Submitted transcode job"
        );

        let handles = job
            .renditions
            .into_iter()
            .map(|task| {
                let encoder = Arc::clone(&self.encoder);
                let pool = Arc::clone(&self.pool);
                let registry = self.registry.clone();
                let source_id = job.source_id.clone();
                let input = job.input_path.clone();

                tokio::spawn(async move {
                    let rendition = task.spec.name;

                    // Queue here when the pool is saturated. Acquire
                    // fails only once the pool is closed for shutdown.
                    let permit = match Arc::clone(&pool).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            registry
                                .mark_running(&source_id, generation, rendition)
                                .await;
                            registry
                                .mark_failed(&source_id, generation, rendition, "scheduler shut down")
                                .await;
                            return;
                        }
                    };

                    registry.mark_running(&source_id, generation, rendition).await;
                    info!(source_id = %source_id, rendition, "Encode started");

                    match encoder.encode(&input, task.spec, &task.output_path).await {
                        Ok(()) => {
                            registry.mark_succeeded(&source_id, generation, rendition).await;
                            info!(
                                source_id = %source_id,
                                rendition,
                                output = %task.output_path.display(),
                                "Encode succeeded"
                            );
                        }
                        Err(e) => {
                            registry
                                .mark_failed(&source_id, generation, rendition, &e.to_string())
                                .await;
                            error!(source_id = %source_id, rendition, "Encode failed: {e}");
                        }
                    }

                    drop(permit);
                })
            })
            .collect();

        Ok(JobHandle {
            source_id: job.source_id,
            handles,
        })
    }

    /// Shut down: refuse new submissions, release queued tasks, and
    /// wait bounded time for in-flight encodes to drain.
    ///
    /// In-flight FFmpeg processes are stopped through the cancellation
    /// channel wired into the encoder at startup, not by this method.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        self.pool.close();

        info!("Scheduler shutting down, waiting for in-flight encodes");
        let drained = tokio::time::timeout(self.config.shutdown_timeout, self.wait_idle()).await;
        if drained.is_err() {
            warn!(
                "Encodes still running after {:?} shutdown timeout",
                self.config.shutdown_timeout
            );
        }
    }

    /// Wait until every pool slot is free again.
    async fn wait_idle(&self) {
        loop {
            if self.pool.available_permits() == self.config.max_concurrent_encodes {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use async_trait::async_trait;
    use tempfile::tempdir;

    use vidshare_media::{MediaError, MediaResult};
    use vidshare_models::{RenditionSpec, TaskState};

    /// Instrumented stand-in for FFmpeg: records the concurrent-call
    /// high-water mark and writes a marker file on success.
    struct MockEncoder {
        delay: Duration,
        fail_renditions: HashSet<&'static str>,
        fail_input_marker: Option<&'static str>,
        concurrent: AtomicUsize,
        high_water: AtomicUsize,
    }

    impl MockEncoder {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                fail_renditions: HashSet::new(),
                fail_input_marker: None,
                concurrent: AtomicUsize::new(0),
                high_water: AtomicUsize::new(0),
            }
        }

        fn failing(mut self, rendition: &'static str) -> Self {
            self.fail_renditions.insert(rendition);
            self
        }

        /// Fail every encode whose input path contains the marker.
        fn failing_input(mut self, marker: &'static str) -> Self {
            self.fail_input_marker = Some(marker);
            self
        }

        fn high_water(&self) -> usize {
            self.high_water.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Encoder for MockEncoder {
        async fn encode(
            &self,
            input: &Path,
            spec: &RenditionSpec,
            output: &Path,
        ) -> MediaResult<()> {
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;
            self.concurrent.fetch_sub(1, Ordering::SeqCst);

            let input_marked = self
                .fail_input_marker
                .is_some_and(|marker| input.to_string_lossy().contains(marker));
            if self.fail_renditions.contains(spec.name) || input_marked {
                return Err(MediaError::ffmpeg_failed(
                    "simulated encoder failure",
                    None,
                    Some(1),
                ));
            }

            tokio::fs::write(output, spec.name).await?;
            Ok(())
        }
    }

    struct Harness {
        _tmp: tempfile::TempDir,
        store: MediaStore,
        encoder: Arc<MockEncoder>,
        scheduler: TranscodeScheduler,
    }

    async fn harness(max_concurrent: usize, encoder: MockEncoder) -> Harness {
        let tmp = tempdir().unwrap();
        let store = MediaStore::new(tmp.path().join("uploads"), tmp.path().join("videos"));
        store.init().await.unwrap();

        let encoder = Arc::new(encoder);
        let config = SchedulerConfig {
            max_concurrent_encodes: max_concurrent,
            ..SchedulerConfig::default()
        };
        let scheduler = TranscodeScheduler::new(
            config,
            Arc::clone(&encoder) as Arc<dyn Encoder>,
            store.clone(),
        );

        Harness {
            _tmp: tmp,
            store,
            encoder,
            scheduler,
        }
    }

    async fn submit_source(h: &Harness, id: &SourceId) -> JobHandle {
        let input = h.store.save_upload(id, b"source bytes").await.unwrap();
        h.scheduler.submit(id.clone(), input).await.unwrap()
    }

    #[tokio::test]
    async fn successful_job_produces_all_renditions() {
        let h = harness(4, MockEncoder::new(Duration::from_millis(5))).await;
        let id = SourceId::parse("abc123").unwrap();

        submit_source(&h, &id).await.wait().await;

        for spec in RenditionSpec::ladder() {
            assert!(
                h.store.rendition_available(&id, spec),
                "missing {}",
                spec.name
            );
        }
        assert!(h.store.default_available(&id));

        let status = h.scheduler.registry().get(&id).await.unwrap();
        assert!(status.is_complete());
        assert!(status.all_succeeded());
    }

    #[tokio::test]
    async fn partial_failure_leaves_siblings_intact() {
        let h = harness(
            4,
            MockEncoder::new(Duration::from_millis(5)).failing("med"),
        )
        .await;
        let id = SourceId::parse("def456").unwrap();

        submit_source(&h, &id).await.wait().await;

        let med = RenditionSpec::by_name("med").unwrap();
        assert!(!h.store.rendition_available(&id, med));
        for spec in RenditionSpec::ladder().iter().filter(|s| s.name != "med") {
            assert!(h.store.rendition_available(&id, spec));
        }

        let status = h.scheduler.registry().get(&id).await.unwrap();
        assert!(status.is_complete());
        let med_task = status.tasks.iter().find(|t| t.rendition == "med").unwrap();
        assert_eq!(med_task.state, TaskState::Failed);
        assert!(med_task.error.as_deref().unwrap().contains("simulated"));
    }

    #[tokio::test]
    async fn pool_bounds_concurrent_encodes_across_jobs() {
        let h = harness(2, MockEncoder::new(Duration::from_millis(20))).await;

        let mut handles = Vec::new();
        for _ in 0..3 {
            let id = SourceId::generate();
            handles.push(submit_source(&h, &id).await);
        }
        for handle in handles {
            handle.wait().await;
        }

        assert!(
            h.encoder.high_water() <= 2,
            "high water {} exceeded pool size",
            h.encoder.high_water()
        );
    }

    #[tokio::test]
    async fn submit_returns_while_encodes_run() {
        let h = harness(4, MockEncoder::new(Duration::from_millis(500))).await;
        let id = SourceId::generate();
        let input = h.store.save_upload(&id, b"source bytes").await.unwrap();

        let start = Instant::now();
        let handle = h.scheduler.submit(id, input).await.unwrap();
        assert!(
            start.elapsed() < Duration::from_millis(50),
            "submit blocked for {:?}",
            start.elapsed()
        );

        handle.wait().await;
    }

    #[tokio::test]
    async fn resubmission_overwrites_previous_outputs() {
        let h = harness(4, MockEncoder::new(Duration::from_millis(5))).await;
        let id = SourceId::parse("ghi789").unwrap();

        submit_source(&h, &id).await.wait().await;
        submit_source(&h, &id).await.wait().await;

        // Same deterministic paths, no accumulation of stale files.
        let mut entries = tokio::fs::read_dir(h.store.video_dir()).await.unwrap();
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, RenditionSpec::ladder().len());

        let status = h.scheduler.registry().get(&id).await.unwrap();
        assert!(status.all_succeeded());
    }

    #[tokio::test]
    async fn overlapping_resubmission_reports_the_fresh_outcome() {
        // Pool wide enough for both submissions to encode at once, and
        // a delay long enough that the first submission's workers are
        // still in flight when the record is replaced.
        let h = harness(
            8,
            MockEncoder::new(Duration::from_millis(100)).failing_input("replaced"),
        )
        .await;
        let id = SourceId::parse("jkl012").unwrap();

        let old_input = h.store.upload_dir().join("replaced.mp4");
        tokio::fs::write(&old_input, b"old source bytes").await.unwrap();
        let new_input = h.store.save_upload(&id, b"new source bytes").await.unwrap();

        let first = h.scheduler.submit(id.clone(), old_input).await.unwrap();
        let second = h.scheduler.submit(id.clone(), new_input).await.unwrap();
        first.wait().await;
        second.wait().await;

        // The first submission's failures land after the record was
        // replaced and must not overwrite the second's outcomes.
        let status = h.scheduler.registry().get(&id).await.unwrap();
        assert!(status.is_complete());
        assert!(
            status.all_succeeded(),
            "stale outcomes leaked into the record: {:?}",
            status.tasks
        );
        for spec in RenditionSpec::ladder() {
            assert!(h.store.rendition_available(&id, spec));
        }
    }

    #[tokio::test]
    async fn shutdown_refuses_new_submissions() {
        let h = harness(4, MockEncoder::new(Duration::from_millis(1))).await;
        h.scheduler.shutdown().await;

        let id = SourceId::generate();
        let err = h
            .scheduler
            .submit(id, "/tmp/in.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::ShutDown));
    }
}
