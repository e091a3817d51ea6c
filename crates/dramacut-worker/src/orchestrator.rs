//! Generation orchestration.
//!
//! Drives the whole run: per title, load the exclusion history, plan
//! windows, fan jobs out through the scheduler, and commit the cut points of
//! the jobs that succeeded in one atomic write. Titles are processed with
//! bounded concurrency; a title never has two batches in flight, so its
//! record has a single writer.

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tracing::{info, warn};

use dramacut_engine::{
    CutPointPlanner, ExclusionStore, PlannerConfig, SamplingPolicy, SceneScorer, TrailerCache,
};
use dramacut_models::{
    CanvasSpec, JobOutcome, MaterialJob, RunSummary, StatusEvent, Title, TitleSummary,
};

use crate::config::GeneratorConfig;
use crate::discover::{choose_output_fps, pick_reference_resolution};
use crate::error::WorkerResult;
use crate::metrics;
use crate::pipeline::MaterialPipeline;
use crate::scheduler::{JobScheduler, MaterialRunner};
use crate::status::StatusSink;

/// Builds the runner used for one title's batch.
pub type RunnerFactory = Arc<dyn Fn(&Title, CanvasSpec) -> Arc<dyn MaterialRunner> + Send + Sync>;

/// Top-level driver of a generation run.
pub struct GenerationOrchestrator {
    config: GeneratorConfig,
    store: ExclusionStore,
    scheduler: JobScheduler,
    sink: Arc<dyn StatusSink>,
    scorer: Option<Arc<dyn SceneScorer>>,
    runner_factory: RunnerFactory,
    shutdown: watch::Sender<bool>,
}

impl GenerationOrchestrator {
    /// Build the orchestrator and validate everything a run cannot start
    /// without: configuration bounds and writable state/cache/output
    /// directories. Failures here abort before any job exists.
    pub fn new(
        config: GeneratorConfig,
        sink: Arc<dyn StatusSink>,
        scorer: Option<Arc<dyn SceneScorer>>,
    ) -> WorkerResult<Self> {
        config.validate()?;

        std::fs::create_dir_all(&config.work_dir)?;
        std::fs::create_dir_all(&config.output_dir)?;
        let store = ExclusionStore::open(&config.state_dir)?;
        let trailer_cache = TrailerCache::open(&config.trailer_cache_dir)?;

        let scheduler = JobScheduler::new(config.max_concurrent_jobs);
        let (shutdown, _) = watch::channel(false);

        let refresh_pending = Arc::new(AtomicBool::new(config.refresh_trailer_cache));
        let runner_factory: RunnerFactory = {
            let config = config.clone();
            Arc::new(move |_title: &Title, canvas: CanvasSpec| {
                Arc::new(MaterialPipeline::new(
                    &config,
                    canvas,
                    trailer_cache.clone(),
                    Arc::clone(&refresh_pending),
                )) as Arc<dyn MaterialRunner>
            })
        };

        Ok(Self {
            config,
            store,
            scheduler,
            sink,
            scorer,
            runner_factory,
            shutdown,
        })
    }

    /// Replace the per-title runner factory (tests, embedding).
    pub fn with_runner_factory(mut self, factory: RunnerFactory) -> Self {
        self.runner_factory = factory;
        self
    }

    /// Ask the run to stop. In-flight jobs finish or fail naturally; titles
    /// whose batch was interrupted skip their exclusion commit.
    pub fn shutdown(&self) {
        // send_replace stores the flag even while nobody is subscribed yet.
        self.shutdown.send_replace(true);
    }

    /// Process every title, with at most `title_parallelism` in flight.
    pub async fn run(&self, titles: Vec<Title>) -> RunSummary {
        // One batch per title per run: the record has a single writer.
        let mut seen = HashSet::new();
        let titles: Vec<Title> = titles
            .into_iter()
            .filter(|t| {
                if seen.insert(t.name.clone()) {
                    true
                } else {
                    warn!(title = %t.name, "duplicate title in run, keeping first occurrence");
                    false
                }
            })
            .collect();

        let summaries = futures::stream::iter(titles)
            .map(|title| self.process_title(title))
            .buffer_unordered(self.config.title_parallelism)
            .collect::<Vec<_>>()
            .await;

        let summary = RunSummary { titles: summaries };
        info!(
            planned = summary.total_planned(),
            succeeded = summary.total_succeeded(),
            failed = summary.total_failed(),
            "run finished"
        );
        summary
    }

    async fn process_title(&self, title: Title) -> TitleSummary {
        let requested = self.config.materials_per_title;
        match self.process_title_inner(&title).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(title = %title.name, error = %e, "title failed before jobs could run");
                TitleSummary {
                    title_name: title.name,
                    requested,
                    planned: 0,
                    succeeded: 0,
                    failed: 0,
                    committed: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn process_title_inner(&self, title: &Title) -> WorkerResult<TitleSummary> {
        let requested = self.config.materials_per_title;

        // 1. History snapshot for this batch.
        let history = self.store.load(&title.name).await;

        // 2. Plan the batch against the snapshot.
        let mut planner = CutPointPlanner::new(PlannerConfig {
            min_duration_secs: self.config.min_duration_secs,
            max_duration_secs: self.config.max_duration_secs,
            exclusion_radius_secs: self.config.exclusion_radius_secs,
            max_attempts_multiplier: self.config.max_attempts_multiplier,
            sampling: SamplingPolicy::default(),
            seed: self.config.seed,
        });
        let windows = planner
            .plan(title, requested, &history, self.scorer.as_deref())
            .await;
        let planned = windows.len();
        if planned < requested {
            metrics::record_planning_shortfall(requested - planned);
        }

        self.report(&title.name, &StatusEvent::BatchStarted { planned })
            .await;

        // 3. Fan the jobs out.
        let (width, height) =
            pick_reference_resolution(&title.episodes, self.config.canvas.as_deref())?;
        let fps = choose_output_fps(&title.episodes, self.config.target_fps, self.config.smart_fps);
        let canvas = CanvasSpec::new(width, height, fps);
        info!(title = %title.name, canvas = %canvas, planned, "starting batch");

        let runner = (self.runner_factory)(title, canvas);
        let jobs: Vec<MaterialJob> = windows
            .into_iter()
            .enumerate()
            .map(|(i, window)| {
                let source = title.episodes[window.episode_idx].source_path.clone();
                MaterialJob::new(&title.name, i + 1, window, source)
            })
            .collect();

        let mut results = self
            .scheduler
            .submit(jobs, runner, self.config.per_title_concurrency);

        // 4. Drain every result; only succeeded jobs surrender a cut point.
        let mut new_points = Vec::new();
        let mut succeeded = 0;
        let mut failed = 0;
        while let Some(result) = results.recv().await {
            match &result.outcome {
                JobOutcome::Succeeded { output } => {
                    succeeded += 1;
                    new_points.push(result.job.cut_point());
                    self.report(
                        &title.name,
                        &StatusEvent::MaterialSucceeded {
                            material_idx: result.job.material_idx,
                            output: output.clone(),
                        },
                    )
                    .await;
                }
                JobOutcome::Failed { reason } => {
                    failed += 1;
                    self.report(
                        &title.name,
                        &StatusEvent::MaterialFailed {
                            material_idx: result.job.material_idx,
                            reason: reason.clone(),
                        },
                    )
                    .await;
                }
            }
        }

        // 5. Commit once per title, unless the batch was interrupted: points
        // left uncommitted simply count as unused on the next run.
        let interrupted = *self.shutdown.subscribe().borrow();
        let committed = if interrupted {
            warn!(
                title = %title.name,
                points = new_points.len(),
                "run interrupted, skipping exclusion commit for this batch"
            );
            false
        } else {
            match self.store.commit(&title.name, &new_points).await {
                Ok(()) => {
                    metrics::record_commit();
                    true
                }
                Err(e) => {
                    warn!(title = %title.name, error = %e, "failed to commit exclusion record");
                    false
                }
            }
        };

        self.report(
            &title.name,
            &StatusEvent::BatchCompleted {
                planned,
                succeeded,
                failed,
            },
        )
        .await;

        Ok(TitleSummary {
            title_name: title.name.clone(),
            requested,
            planned,
            succeeded,
            failed,
            committed,
            error: None,
        })
    }

    /// Fire-and-forget status delivery; sink trouble never fails generation.
    async fn report(&self, title: &str, event: &StatusEvent) {
        if let Err(e) = self.sink.report(title, event).await {
            warn!(title = %title, error = %e, "status sink failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dramacut_models::Episode;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    use crate::error::WorkerError;
    use crate::status::LogStatusSink;

    fn test_config(root: &TempDir) -> GeneratorConfig {
        GeneratorConfig {
            output_dir: root.path().join("exports"),
            work_dir: root.path().join("work"),
            state_dir: root.path().join("state"),
            trailer_cache_dir: root.path().join("trailer_cache"),
            materials_per_title: 3,
            min_duration_secs: 60.0,
            max_duration_secs: 90.0,
            seed: Some(21),
            ..GeneratorConfig::default()
        }
    }

    fn test_title(name: &str) -> Title {
        let episodes = (0..2)
            .map(|index| Episode {
                index,
                source_path: PathBuf::from(format!("{}/{}.mp4", name, index + 1)),
                duration_secs: 600.0,
                width: 1920,
                height: 1080,
                fps: 30.0,
            })
            .collect();
        Title::new(name, episodes)
    }

    /// Runner that fails a fixed material index and succeeds otherwise.
    struct SelectiveRunner {
        fail_idx: Option<usize>,
        delay: Duration,
    }

    #[async_trait]
    impl MaterialRunner for SelectiveRunner {
        async fn run(&self, job: &MaterialJob) -> WorkerResult<PathBuf> {
            tokio::time::sleep(self.delay).await;
            if Some(job.material_idx) == self.fail_idx {
                Err(WorkerError::job_failed("encoder exited with status 1"))
            } else {
                Ok(PathBuf::from(format!("{}.mp4", job.material_idx)))
            }
        }
    }

    fn orchestrator_with(
        config: GeneratorConfig,
        sink: Arc<dyn StatusSink>,
        fail_idx: Option<usize>,
        delay: Duration,
    ) -> GenerationOrchestrator {
        GenerationOrchestrator::new(config, sink, None)
            .unwrap()
            .with_runner_factory(Arc::new(move |_title: &Title, _canvas: CanvasSpec| {
                Arc::new(SelectiveRunner { fail_idx, delay }) as Arc<dyn MaterialRunner>
            }))
    }

    #[tokio::test]
    async fn test_failed_jobs_commit_no_cut_points() {
        let root = TempDir::new().unwrap();
        let config = test_config(&root);
        let orchestrator = orchestrator_with(
            config.clone(),
            Arc::new(LogStatusSink),
            Some(2),
            Duration::ZERO,
        );

        let summary = orchestrator.run(vec![test_title("demo")]).await;
        assert_eq!(summary.titles.len(), 1);
        let title = &summary.titles[0];
        assert_eq!((title.planned, title.succeeded, title.failed), (3, 2, 1));
        assert!(title.committed);

        // Only the two succeeded jobs surrendered their start timestamps.
        let store = ExclusionStore::open(config.state_dir).unwrap();
        let history = store.load("demo").await;
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_second_run_avoids_committed_points() {
        let root = TempDir::new().unwrap();
        let config = test_config(&root);
        let orchestrator =
            orchestrator_with(config.clone(), Arc::new(LogStatusSink), None, Duration::ZERO);

        orchestrator.run(vec![test_title("demo")]).await;

        let store = ExclusionStore::open(&config.state_dir).unwrap();
        let first_points: Vec<_> = store.load("demo").await.points().to_vec();
        assert_eq!(first_points.len(), 3);

        let summary = orchestrator.run(vec![test_title("demo")]).await;
        assert_eq!(summary.titles[0].succeeded, 3);

        let all_points = store.load("demo").await;
        assert_eq!(all_points.len(), 6);
        for new_point in &all_points.points()[3..] {
            for old_point in &first_points {
                assert!(
                    !old_point.conflicts_with(new_point.episode_idx, new_point.timestamp, 30.0),
                    "second run reused footage near a committed point"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_interrupted_batch_skips_commit() {
        let root = TempDir::new().unwrap();
        let config = test_config(&root);
        let orchestrator = orchestrator_with(
            config.clone(),
            Arc::new(LogStatusSink),
            None,
            Duration::from_millis(50),
        );

        let (summary, _) = tokio::join!(orchestrator.run(vec![test_title("demo")]), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            orchestrator.shutdown();
        });

        // Jobs were allowed to finish, but nothing was committed.
        assert_eq!(summary.titles[0].succeeded, 3);
        assert!(!summary.titles[0].committed);
        let store = ExclusionStore::open(config.state_dir).unwrap();
        assert!(store.load("demo").await.is_empty());
    }

    /// Sink that records every event and fails on demand.
    struct RecordingSink {
        events: Mutex<Vec<(String, StatusEvent)>>,
        failing: bool,
    }

    #[async_trait]
    impl StatusSink for RecordingSink {
        async fn report(&self, title: &str, event: &StatusEvent) -> anyhow::Result<()> {
            self.events
                .lock()
                .unwrap()
                .push((title.to_string(), event.clone()));
            if self.failing {
                anyhow::bail!("webhook unreachable");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_status_events_and_sink_failures_tolerated() {
        let root = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink {
            events: Mutex::new(Vec::new()),
            failing: true,
        });
        let orchestrator = orchestrator_with(
            test_config(&root),
            Arc::clone(&sink) as Arc<dyn StatusSink>,
            None,
            Duration::ZERO,
        );

        let summary = orchestrator.run(vec![test_title("demo")]).await;
        assert_eq!(summary.titles[0].succeeded, 3);

        let events = sink.events.lock().unwrap();
        assert!(matches!(events.first(), Some((_, StatusEvent::BatchStarted { planned: 3 }))));
        assert!(matches!(
            events.last(),
            Some((_, StatusEvent::BatchCompleted { succeeded: 3, .. }))
        ));
        // 1 start + 3 materials + 1 completion
        assert_eq!(events.len(), 5);
    }

    #[tokio::test]
    async fn test_duplicate_titles_processed_once() {
        let root = TempDir::new().unwrap();
        let orchestrator = orchestrator_with(
            test_config(&root),
            Arc::new(LogStatusSink),
            None,
            Duration::ZERO,
        );

        let summary = orchestrator
            .run(vec![test_title("demo"), test_title("demo")])
            .await;
        assert_eq!(summary.titles.len(), 1);
    }

    #[tokio::test]
    async fn test_unwritable_state_dir_is_fatal() {
        let root = TempDir::new().unwrap();
        let blocker = root.path().join("blocked");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let config = GeneratorConfig {
            state_dir: blocker.join("state"),
            ..test_config(&root)
        };
        assert!(GenerationOrchestrator::new(config, Arc::new(LogStatusSink), None).is_err());
    }
}
