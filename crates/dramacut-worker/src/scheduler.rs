//! Bounded job scheduling.
//!
//! Fans one title's batch of material jobs out across tokio tasks, holding
//! two permits per running job: the batch's per-title slot and the global
//! pool slot. Results stream back in completion order; every submitted job
//! yields exactly one terminal result, including jobs whose pipeline
//! panicked.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error};

use dramacut_models::{JobOutcome, JobResult, JobState, MaterialJob};

use crate::error::WorkerResult;

/// Executes one material job to completion.
///
/// The production implementation is the FFmpeg pipeline; tests use fakes.
#[async_trait]
pub trait MaterialRunner: Send + Sync + 'static {
    async fn run(&self, job: &MaterialJob) -> WorkerResult<PathBuf>;
}

/// Fans material jobs out over a bounded worker pool.
#[derive(Clone)]
pub struct JobScheduler {
    global: Arc<Semaphore>,
}

impl JobScheduler {
    /// `global_limit` caps running jobs across all titles.
    pub fn new(global_limit: usize) -> Self {
        Self {
            global: Arc::new(Semaphore::new(global_limit)),
        }
    }

    /// Submit one title's batch.
    ///
    /// At most `per_title_limit` of these jobs run at any instant. The
    /// receiver yields one [`JobResult`] per submitted job and closes once
    /// all of them resolved. A job failure is reported as data and never
    /// aborts its siblings.
    pub fn submit(
        &self,
        jobs: Vec<MaterialJob>,
        runner: Arc<dyn MaterialRunner>,
        per_title_limit: usize,
    ) -> mpsc::Receiver<JobResult> {
        let (tx, rx) = mpsc::channel(jobs.len().max(1));
        let title_slots = Arc::new(Semaphore::new(per_title_limit.max(1)));

        for mut job in jobs {
            let tx = tx.clone();
            let runner = Arc::clone(&runner);
            let global = Arc::clone(&self.global);
            let title_slots = Arc::clone(&title_slots);

            tokio::spawn(async move {
                let outcome = match (
                    title_slots.acquire_owned().await,
                    global.acquire_owned().await,
                ) {
                    (Ok(_title_permit), Ok(_global_permit)) => {
                        job.state = JobState::Running;
                        debug!(job_id = %job.id, title = %job.title_name, "job running");

                        match AssertUnwindSafe(runner.run(&job)).catch_unwind().await {
                            Ok(Ok(output)) => {
                                job.state = JobState::Succeeded;
                                JobOutcome::Succeeded { output }
                            }
                            Ok(Err(e)) => {
                                job.state = JobState::Failed;
                                JobOutcome::Failed {
                                    reason: e.to_string(),
                                }
                            }
                            Err(_) => {
                                error!(job_id = %job.id, "material pipeline panicked");
                                job.state = JobState::Failed;
                                JobOutcome::Failed {
                                    reason: "material pipeline panicked".to_string(),
                                }
                            }
                        }
                    }
                    // Only reachable if a semaphore is closed; still report a
                    // terminal result rather than dropping the job.
                    _ => {
                        job.state = JobState::Failed;
                        JobOutcome::Failed {
                            reason: "scheduler shut down before the job could run".to_string(),
                        }
                    }
                };

                let _ = tx.send(JobResult { job, outcome }).await;
            });
        }

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dramacut_models::CandidateWindow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::error::WorkerError;

    fn jobs(count: usize) -> Vec<MaterialJob> {
        (1..=count)
            .map(|idx| {
                MaterialJob::new(
                    "demo",
                    idx,
                    CandidateWindow::random(0, idx as f64 * 100.0, 60.0),
                    PathBuf::from("1.mp4"),
                )
            })
            .collect()
    }

    /// Runner that tracks the high-water mark of concurrently running jobs.
    struct GaugedRunner {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl GaugedRunner {
        fn new() -> Self {
            Self {
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MaterialRunner for GaugedRunner {
        async fn run(&self, job: &MaterialJob) -> WorkerResult<PathBuf> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(PathBuf::from(format!("{}.mp4", job.material_idx)))
        }
    }

    #[tokio::test]
    async fn test_per_title_limit_and_result_count() {
        let scheduler = JobScheduler::new(64);
        let runner = Arc::new(GaugedRunner::new());

        let runner_dyn: Arc<dyn MaterialRunner> = Arc::clone(&runner) as Arc<dyn MaterialRunner>;
        let mut rx = scheduler.submit(jobs(10), runner_dyn, 3);

        let mut results = Vec::new();
        while let Some(result) = rx.recv().await {
            results.push(result);
        }

        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|r| r.outcome.is_success()));
        assert!(results.iter().all(|r| r.job.state == JobState::Succeeded));
        assert!(
            runner.peak.load(Ordering::SeqCst) <= 3,
            "per-title limit was exceeded"
        );
    }

    struct FlakyRunner;

    #[async_trait]
    impl MaterialRunner for FlakyRunner {
        async fn run(&self, job: &MaterialJob) -> WorkerResult<PathBuf> {
            if job.material_idx % 2 == 0 {
                Err(WorkerError::job_failed("no space left on device"))
            } else {
                Ok(PathBuf::from(format!("{}.mp4", job.material_idx)))
            }
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_siblings() {
        let scheduler = JobScheduler::new(8);
        let mut rx = scheduler.submit(jobs(10), Arc::new(FlakyRunner), 4);

        let mut succeeded = 0;
        let mut failed = 0;
        while let Some(result) = rx.recv().await {
            match result.outcome {
                JobOutcome::Succeeded { .. } => succeeded += 1,
                JobOutcome::Failed { ref reason } => {
                    assert!(reason.contains("no space"));
                    failed += 1;
                }
            }
        }

        assert_eq!((succeeded, failed), (5, 5));
    }

    struct PanickyRunner;

    #[async_trait]
    impl MaterialRunner for PanickyRunner {
        async fn run(&self, job: &MaterialJob) -> WorkerResult<PathBuf> {
            if job.material_idx == 2 {
                panic!("boom");
            }
            Ok(PathBuf::from("ok.mp4"))
        }
    }

    #[tokio::test]
    async fn test_panicked_job_still_reports() {
        let scheduler = JobScheduler::new(4);
        let mut rx = scheduler.submit(jobs(3), Arc::new(PanickyRunner), 2);

        let mut results = Vec::new();
        while let Some(result) = rx.recv().await {
            results.push(result);
        }

        assert_eq!(results.len(), 3);
        let panicked: Vec<_> = results
            .iter()
            .filter(|r| !r.outcome.is_success())
            .collect();
        assert_eq!(panicked.len(), 1);
        assert_eq!(panicked[0].job.material_idx, 2);
    }
}
