//! Used cut points and the persisted per-title exclusion record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The start timestamp of a previously generated material.
///
/// Identity is the `(episode_idx, timestamp)` pair within one title's record.
/// Duplicates are harmless; insertion order is preserved for auditability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutPoint {
    /// Episode index within the title (0-based).
    pub episode_idx: usize,

    /// Start timestamp in seconds.
    pub timestamp: f64,
}

impl CutPoint {
    pub fn new(episode_idx: usize, timestamp: f64) -> Self {
        Self {
            episode_idx,
            timestamp,
        }
    }

    /// Whether `timestamp` in the same episode lies strictly within
    /// `radius` seconds of this point.
    pub fn conflicts_with(&self, episode_idx: usize, timestamp: f64, radius: f64) -> bool {
        self.episode_idx == episode_idx && (self.timestamp - timestamp).abs() < radius
    }
}

/// Persisted per-title record of used cut points.
///
/// One JSON file per title; field names are part of the on-disk format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionRecord {
    pub drama_name: String,
    pub last_updated: DateTime<Utc>,
    pub used_cut_points: Vec<CutPoint>,
}

impl ExclusionRecord {
    /// Fresh, empty record for a title.
    pub fn empty(drama_name: impl Into<String>) -> Self {
        Self {
            drama_name: drama_name.into(),
            last_updated: Utc::now(),
            used_cut_points: Vec::new(),
        }
    }

    /// Append new points, preserving existing order, and refresh the stamp.
    pub fn append(&mut self, points: impl IntoIterator<Item = CutPoint>) {
        self.used_cut_points.extend(points);
        self.last_updated = Utc::now();
    }
}
