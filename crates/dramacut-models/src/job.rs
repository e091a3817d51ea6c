//! Material generation jobs.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CandidateWindow, CutPoint};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// One unit of generation work: a planned window for one material of a title.
///
/// Owned exclusively by the scheduler for its lifetime; the result is
/// reported back to the orchestrator and the job is then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialJob {
    pub id: JobId,
    pub title_name: String,
    /// 1-based material index within the title's batch.
    pub material_idx: usize,
    pub window: CandidateWindow,
    /// Source file of the window's episode.
    pub source_path: PathBuf,
    #[serde(default)]
    pub state: JobState,
}

impl MaterialJob {
    pub fn new(
        title_name: impl Into<String>,
        material_idx: usize,
        window: CandidateWindow,
        source_path: PathBuf,
    ) -> Self {
        Self {
            id: JobId::new(),
            title_name: title_name.into(),
            material_idx,
            window,
            source_path,
            state: JobState::Pending,
        }
    }

    /// The cut point consumed by this job, valid only once it succeeded.
    pub fn cut_point(&self) -> CutPoint {
        self.window.cut_point()
    }
}

/// Terminal outcome of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded { output: PathBuf },
    Failed { reason: String },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

/// A job paired with its terminal outcome.
///
/// Every submitted job yields exactly one of these; delivery order is
/// completion order, not submission order.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job: MaterialJob,
    pub outcome: JobOutcome,
}
