//! Cut-point planning.
//!
//! Produces the candidate windows for one title's batch. Guided candidates
//! from the scene scorer are consumed in descending confidence order; random
//! sampling fills the remainder. Every accepted window is checked against the
//! persisted exclusion history *and* the windows already accepted in the same
//! batch, so one planning call can never hand out overlapping footage.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use dramacut_models::{CandidateWindow, CutPoint, Title};

use crate::exclusion::ExclusionHistory;
use crate::guidance::{SamplingPolicy, SceneScorer};

/// Default minimum distance between a new start and any used cut point.
pub const DEFAULT_EXCLUSION_RADIUS_SECS: f64 = 30.0;

/// Default cap on random attempts, as a multiple of the requested count.
pub const DEFAULT_MAX_ATTEMPTS_MULTIPLIER: usize = 10;

/// Planner policy knobs.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Shortest window to produce, seconds.
    pub min_duration_secs: f64,
    /// Longest window to produce, seconds.
    pub max_duration_secs: f64,
    /// Exclusion radius applied against history and same-batch windows.
    pub exclusion_radius_secs: f64,
    /// Random-phase attempt budget is `count * max_attempts_multiplier`.
    pub max_attempts_multiplier: usize,
    /// Sampling policy handed to the guidance source.
    pub sampling: SamplingPolicy,
    /// Fixed seed for reproducible plans; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: 60.0,
            max_duration_secs: 90.0,
            exclusion_radius_secs: DEFAULT_EXCLUSION_RADIUS_SECS,
            max_attempts_multiplier: DEFAULT_MAX_ATTEMPTS_MULTIPLIER,
            sampling: SamplingPolicy::default(),
            seed: None,
        }
    }
}

/// In-memory record of the starts accepted while this batch is being planned.
/// Provisional only: nothing is persisted until the orchestrator commits the
/// points of succeeded jobs.
#[derive(Debug)]
struct BatchLedger {
    radius: f64,
    accepted: Vec<CutPoint>,
}

impl BatchLedger {
    fn new(radius: f64) -> Self {
        Self {
            radius,
            accepted: Vec::new(),
        }
    }

    fn conflicts(&self, episode_idx: usize, timestamp: f64) -> bool {
        self.accepted
            .iter()
            .any(|p| p.conflicts_with(episode_idx, timestamp, self.radius))
    }

    fn record(&mut self, episode_idx: usize, timestamp: f64) {
        self.accepted.push(CutPoint::new(episode_idx, timestamp));
    }
}

/// Plans candidate windows for one title.
#[derive(Debug)]
pub struct CutPointPlanner {
    config: PlannerConfig,
    rng: StdRng,
}

impl CutPointPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, rng }
    }

    /// Plan up to `count` windows for `title`.
    ///
    /// Returns fewer than `count` only when guided candidates and the random
    /// attempt budget are both exhausted; under-production is the caller's
    /// to report, never an error.
    pub async fn plan(
        &mut self,
        title: &Title,
        count: usize,
        history: &ExclusionHistory,
        scorer: Option<&dyn SceneScorer>,
    ) -> Vec<CandidateWindow> {
        let mut windows = Vec::with_capacity(count);
        if count == 0 || title.episodes.is_empty() {
            return windows;
        }

        let mut ledger = BatchLedger::new(self.config.exclusion_radius_secs);

        if let Some(scorer) = scorer {
            self.guided_phase(title, count, history, scorer, &mut ledger, &mut windows)
                .await;
        }

        if windows.len() < count {
            self.random_phase(title, count, history, &mut ledger, &mut windows);
        }

        if windows.len() < count {
            warn!(
                title = %title.name,
                planned = windows.len(),
                requested = count,
                "planning shortfall: not enough non-excluded footage"
            );
        }

        windows
    }

    /// Consume scorer candidates in descending confidence order.
    async fn guided_phase(
        &mut self,
        title: &Title,
        count: usize,
        history: &ExclusionHistory,
        scorer: &dyn SceneScorer,
        ledger: &mut BatchLedger,
        windows: &mut Vec<CandidateWindow>,
    ) {
        let mut candidates = Vec::new();
        for episode in &title.episodes {
            match scorer
                .score_candidates(&episode.source_path, &self.config.sampling)
                .await
            {
                Ok(scored) => {
                    candidates.extend(scored.into_iter().map(|c| (episode.index, c)));
                }
                Err(e) => {
                    warn!(
                        title = %title.name,
                        episode = episode.index,
                        error = %e,
                        "guidance source failed, episode falls back to random sampling"
                    );
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.1.confidence
                .partial_cmp(&a.1.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for (episode_idx, candidate) in candidates {
            if windows.len() >= count {
                break;
            }

            let duration = self.draw_duration();
            let start = candidate.timestamp;

            if history.is_excluded(episode_idx, start, self.config.exclusion_radius_secs)
                || ledger.conflicts(episode_idx, start)
            {
                debug!(
                    title = %title.name,
                    episode = episode_idx,
                    start_secs = start,
                    "skipping guided candidate inside exclusion radius"
                );
                continue;
            }

            if !title.episodes[episode_idx].fits(start, duration) {
                continue;
            }

            ledger.record(episode_idx, start);
            windows.push(CandidateWindow::guided(
                episode_idx,
                start,
                duration,
                candidate.confidence,
            ));
        }
    }

    /// Uniform random sampling, episodes weighted by usable duration.
    fn random_phase(
        &mut self,
        title: &Title,
        count: usize,
        history: &ExclusionHistory,
        ledger: &mut BatchLedger,
        windows: &mut Vec<CandidateWindow>,
    ) {
        let budget = count * self.config.max_attempts_multiplier;
        let mut attempts = 0;

        while windows.len() < count && attempts < budget {
            attempts += 1;

            let duration = self.draw_duration();

            let weights: Vec<f64> = title
                .episodes
                .iter()
                .map(|e| e.usable_secs(duration))
                .collect();
            let total: f64 = weights.iter().sum();
            if total <= 0.0 {
                // Nothing can hold a window this long; a shorter draw may.
                continue;
            }

            let mut pick = self.rng.random_range(0.0..total);
            let mut episode_idx = title.episodes.len() - 1;
            for (idx, weight) in weights.iter().enumerate() {
                if pick < *weight {
                    episode_idx = idx;
                    break;
                }
                pick -= weight;
            }

            let usable = weights[episode_idx];
            let start = round3(self.rng.random_range(0.0..=usable));

            if history.is_excluded(episode_idx, start, self.config.exclusion_radius_secs)
                || ledger.conflicts(episode_idx, start)
            {
                continue;
            }

            ledger.record(episode_idx, start);
            windows.push(CandidateWindow::random(episode_idx, start, duration));
        }

        debug!(
            title = %title.name,
            attempts,
            accepted = windows.len(),
            "random phase finished"
        );
    }

    fn draw_duration(&mut self) -> f64 {
        let (min, max) = (self.config.min_duration_secs, self.config.max_duration_secs);
        if max <= min {
            return min;
        }
        round3(self.rng.random_range(min..=max))
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineResult;
    use crate::guidance::ScoredCandidate;
    use async_trait::async_trait;
    use dramacut_models::{Episode, WindowSource};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn episode(index: usize, duration: f64) -> Episode {
        Episode {
            index,
            source_path: PathBuf::from(format!("ep{:02}.mp4", index + 1)),
            duration_secs: duration,
            width: 1920,
            height: 1080,
            fps: 30.0,
        }
    }

    fn title(durations: &[f64]) -> Title {
        Title::new(
            "demo",
            durations
                .iter()
                .enumerate()
                .map(|(i, d)| episode(i, *d))
                .collect(),
        )
    }

    fn config(seed: u64) -> PlannerConfig {
        PlannerConfig {
            min_duration_secs: 60.0,
            max_duration_secs: 90.0,
            seed: Some(seed),
            ..PlannerConfig::default()
        }
    }

    fn assert_radius_respected(windows: &[CandidateWindow], radius: f64) {
        for i in 0..windows.len() {
            for j in (i + 1)..windows.len() {
                let (a, b) = (&windows[i], &windows[j]);
                if a.episode_idx == b.episode_idx {
                    assert!(
                        (a.start_secs - b.start_secs).abs() >= radius,
                        "windows {} and {} violate the radius",
                        i,
                        j
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn test_plan_is_deterministic_with_seed() {
        let title = title(&[600.0, 600.0]);
        let history = ExclusionHistory::default();

        let first = CutPointPlanner::new(config(7))
            .plan(&title, 3, &history, None)
            .await;
        let second = CutPointPlanner::new(config(7))
            .plan(&title, 3, &history, None)
            .await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_two_episode_scenario_respects_history_between_runs() {
        let title = title(&[600.0, 600.0]);

        let first = CutPointPlanner::new(config(11))
            .plan(&title, 3, &ExclusionHistory::default(), None)
            .await;
        assert_eq!(first.len(), 3);
        assert_radius_respected(&first, 30.0);
        for w in &first {
            assert!(w.duration_secs() >= 60.0 && w.duration_secs() <= 90.0);
            assert!(title.episodes[w.episode_idx].fits(w.start_secs, w.duration_secs()));
        }

        // Commit the first run, then replan with the same seed.
        let committed = ExclusionHistory::new(first.iter().map(|w| w.cut_point()).collect());
        let second = CutPointPlanner::new(config(11))
            .plan(&title, 3, &committed, None)
            .await;
        assert_eq!(second.len(), 3);
        assert_radius_respected(&second, 30.0);
        for w in &second {
            assert!(
                !committed.is_excluded(w.episode_idx, w.start_secs, 30.0),
                "replanned window reuses committed footage"
            );
        }
    }

    #[tokio::test]
    async fn test_shortfall_returns_what_fits() {
        // An 80s episode with 60-75s windows leaves at most a 20s start
        // range: a second window can never clear the 30s radius.
        let title = title(&[80.0]);
        let mut planner = CutPointPlanner::new(PlannerConfig {
            min_duration_secs: 60.0,
            max_duration_secs: 75.0,
            seed: Some(3),
            ..PlannerConfig::default()
        });

        let windows = planner
            .plan(&title, 5, &ExclusionHistory::default(), None)
            .await;
        assert_eq!(windows.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_title_plans_nothing() {
        let title = Title::new("empty", Vec::new());
        let mut planner = CutPointPlanner::new(config(1));
        assert!(planner
            .plan(&title, 3, &ExclusionHistory::default(), None)
            .await
            .is_empty());
    }

    struct MapScorer {
        by_file: HashMap<String, Vec<ScoredCandidate>>,
    }

    #[async_trait]
    impl SceneScorer for MapScorer {
        async fn score_candidates(
            &self,
            video: &Path,
            _policy: &SamplingPolicy,
        ) -> EngineResult<Vec<ScoredCandidate>> {
            Ok(self
                .by_file
                .get(&video.to_string_lossy().to_string())
                .cloned()
                .unwrap_or_default())
        }
    }

    fn scorer(entries: &[(&str, f64, f64)]) -> MapScorer {
        let mut by_file: HashMap<String, Vec<ScoredCandidate>> = HashMap::new();
        for (file, timestamp, confidence) in entries {
            by_file.entry(file.to_string()).or_default().push(ScoredCandidate {
                timestamp: *timestamp,
                confidence: *confidence,
            });
        }
        MapScorer { by_file }
    }

    #[tokio::test]
    async fn test_guided_candidates_taken_by_confidence() {
        let title = title(&[600.0, 600.0]);
        let scorer = scorer(&[("ep01.mp4", 100.0, 0.6), ("ep02.mp4", 250.0, 0.9)]);

        let windows = CutPointPlanner::new(config(5))
            .plan(&title, 2, &ExclusionHistory::default(), Some(&scorer))
            .await;

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].source, WindowSource::Guided);
        assert_eq!(windows[0].episode_idx, 1);
        assert!((windows[0].start_secs - 250.0).abs() < f64::EPSILON);
        assert!((windows[0].confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(windows[1].episode_idx, 0);
    }

    #[tokio::test]
    async fn test_guided_respects_history_and_falls_back_to_random() {
        let title = title(&[600.0, 600.0]);
        let scorer = scorer(&[("ep01.mp4", 100.0, 0.9)]);
        // The only guided candidate sits on used footage.
        let history = ExclusionHistory::new(vec![CutPoint::new(0, 110.0)]);

        let windows = CutPointPlanner::new(config(9))
            .plan(&title, 2, &history, Some(&scorer))
            .await;

        assert_eq!(windows.len(), 2);
        assert!(windows.iter().all(|w| w.source == WindowSource::Random));
        for w in &windows {
            assert!(!history.is_excluded(w.episode_idx, w.start_secs, 30.0));
        }
    }

    #[tokio::test]
    async fn test_failing_scorer_degrades_to_random() {
        struct BrokenScorer;

        #[async_trait]
        impl SceneScorer for BrokenScorer {
            async fn score_candidates(
                &self,
                _video: &Path,
                _policy: &SamplingPolicy,
            ) -> EngineResult<Vec<ScoredCandidate>> {
                Err(crate::error::EngineError::guidance("model unavailable"))
            }
        }

        let title = title(&[600.0]);
        let windows = CutPointPlanner::new(config(2))
            .plan(&title, 2, &ExclusionHistory::default(), Some(&BrokenScorer))
            .await;

        assert_eq!(windows.len(), 2);
        assert!(windows.iter().all(|w| w.source == WindowSource::Random));
    }

    #[tokio::test]
    async fn test_unseeded_plans_differ() {
        let title = title(&[3600.0]);
        let unseeded = PlannerConfig {
            min_duration_secs: 60.0,
            max_duration_secs: 90.0,
            seed: None,
            ..PlannerConfig::default()
        };

        let first = CutPointPlanner::new(unseeded.clone())
            .plan(&title, 3, &ExclusionHistory::default(), None)
            .await;
        let second = CutPointPlanner::new(unseeded)
            .plan(&title, 3, &ExclusionHistory::default(), None)
            .await;

        // 3 draws over an hour of footage colliding exactly is as good as
        // impossible; equality here means the rng was not reseeded.
        assert_ne!(first, second);
    }
}
