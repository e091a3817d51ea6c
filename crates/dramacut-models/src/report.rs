//! Batch status events and run summaries.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Per-title progress event forwarded to the status sink.
///
/// The core only emits these; how they are displayed or delivered (log line,
/// webhook, spreadsheet update) is the sink's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatusEvent {
    BatchStarted {
        planned: usize,
    },
    MaterialSucceeded {
        material_idx: usize,
        output: PathBuf,
    },
    MaterialFailed {
        material_idx: usize,
        reason: String,
    },
    BatchCompleted {
        planned: usize,
        succeeded: usize,
        failed: usize,
    },
}

/// Outcome counts for one title's batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleSummary {
    pub title_name: String,
    /// Materials requested by configuration.
    pub requested: usize,
    /// Windows the planner actually produced (may fall short of requested).
    pub planned: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Whether the batch's new cut points were committed to the store.
    pub committed: bool,
    /// Set when the title failed before any job could run.
    pub error: Option<String>,
}

impl TitleSummary {
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.planned)
    }
}

/// Aggregate over all titles of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub titles: Vec<TitleSummary>,
}

impl RunSummary {
    pub fn total_planned(&self) -> usize {
        self.titles.iter().map(|t| t.planned).sum()
    }

    pub fn total_succeeded(&self) -> usize {
        self.titles.iter().map(|t| t.succeeded).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.titles.iter().map(|t| t.failed).sum()
    }
}
