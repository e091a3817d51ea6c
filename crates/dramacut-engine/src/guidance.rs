//! Scene-scorer guidance boundary.
//!
//! The scoring model itself lives outside this crate; the planner only sees
//! ranked `(timestamp, confidence)` candidates.

use std::path::Path;

use async_trait::async_trait;

use crate::error::EngineResult;

/// How candidates should be sampled from an episode.
#[derive(Debug, Clone, Copy)]
pub struct SamplingPolicy {
    /// Minimum gap between returned candidates.
    pub min_gap_secs: f64,
    /// Skip this much of the episode head (intros, ads).
    pub head_skip_secs: f64,
    /// Leave this much room before the episode end.
    pub tail_skip_secs: f64,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            min_gap_secs: 2.0,
            head_skip_secs: 3.0,
            tail_skip_secs: 15.0,
        }
    }
}

/// A candidate start timestamp with the scorer's confidence in it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate {
    pub timestamp: f64,
    pub confidence: f64,
}

/// Pluggable scene-quality scorer.
///
/// Implementations rank candidate start timestamps for one video file.
/// The planner works without one; scorer failures degrade to random
/// sampling and never abort planning.
#[async_trait]
pub trait SceneScorer: Send + Sync {
    async fn score_candidates(
        &self,
        video: &Path,
        policy: &SamplingPolicy,
    ) -> EngineResult<Vec<ScoredCandidate>>;
}
