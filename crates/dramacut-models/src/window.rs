//! Candidate windows produced by planning.

use serde::{Deserialize, Serialize};

use crate::CutPoint;

/// How a candidate window was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSource {
    /// Uniform random sampling.
    Random,
    /// Suggested by the scene-quality scorer.
    Guided,
}

/// A planned `[start, end)` window inside one episode.
///
/// Transient: consumed by exactly one job. Only the start timestamp becomes
/// a [`CutPoint`] once the job that used the window succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateWindow {
    pub episode_idx: usize,
    pub start_secs: f64,
    pub end_secs: f64,
    pub source: WindowSource,
    /// Scorer confidence for guided windows, 0.0 for random ones.
    pub confidence: f64,
}

impl CandidateWindow {
    pub fn random(episode_idx: usize, start_secs: f64, duration_secs: f64) -> Self {
        Self {
            episode_idx,
            start_secs,
            end_secs: start_secs + duration_secs,
            source: WindowSource::Random,
            confidence: 0.0,
        }
    }

    pub fn guided(episode_idx: usize, start_secs: f64, duration_secs: f64, confidence: f64) -> Self {
        Self {
            episode_idx,
            start_secs,
            end_secs: start_secs + duration_secs,
            source: WindowSource::Guided,
            confidence,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// The cut point this window consumes if its job succeeds.
    pub fn cut_point(&self) -> CutPoint {
        CutPoint::new(self.episode_idx, self.start_secs)
    }
}
