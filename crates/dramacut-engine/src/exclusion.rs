//! Persistent per-title exclusion store.
//!
//! One JSON record per title, keeping the start timestamps of every material
//! generated in earlier runs. Planning consults an immutable snapshot of the
//! record; newly used points are appended in a single atomic commit after the
//! title's batch resolves.

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info, warn};

use dramacut_models::{CutPoint, ExclusionRecord};

use crate::error::{EngineError, EngineResult};

/// Immutable snapshot of a title's used cut points, as loaded at the start
/// of a batch.
#[derive(Debug, Clone, Default)]
pub struct ExclusionHistory {
    points: Vec<CutPoint>,
}

impl ExclusionHistory {
    pub fn new(points: Vec<CutPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True iff any recorded point in the same episode lies within `radius`
    /// seconds of `timestamp`.
    pub fn is_excluded(&self, episode_idx: usize, timestamp: f64, radius: f64) -> bool {
        self.points
            .iter()
            .any(|p| p.conflicts_with(episode_idx, timestamp, radius))
    }

    pub fn points(&self) -> &[CutPoint] {
        &self.points
    }
}

/// File-backed store of [`ExclusionRecord`]s, one file per title.
#[derive(Debug, Clone)]
pub struct ExclusionStore {
    base_dir: PathBuf,
}

impl ExclusionStore {
    /// Open the store, creating its directory.
    ///
    /// Fails when the directory cannot be created: without durable storage
    /// no generated material can be recorded, so the run must not start.
    pub fn open(base_dir: impl Into<PathBuf>) -> EngineResult<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)
            .map_err(|_| EngineError::StateDirUnavailable(base_dir.clone()))?;
        Ok(Self { base_dir })
    }

    /// Path of the record file for a title.
    pub fn record_path(&self, title: &str) -> PathBuf {
        self.base_dir.join(record_file_name(title))
    }

    /// Load the used cut points for a title.
    ///
    /// A missing record is an empty history. A corrupt record is also an
    /// empty history with a warning (fail-open): losing dedup history must
    /// never block generation.
    pub async fn load(&self, title: &str) -> ExclusionHistory {
        let path = self.record_path(title);

        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(title = %title, "no exclusion record on file");
                return ExclusionHistory::default();
            }
            Err(e) => {
                warn!(title = %title, error = %e, "failed to read exclusion record, treating as empty");
                return ExclusionHistory::default();
            }
        };

        match serde_json::from_slice::<ExclusionRecord>(&raw) {
            Ok(record) => {
                info!(
                    title = %title,
                    points = record.used_cut_points.len(),
                    "loaded exclusion history"
                );
                ExclusionHistory::new(record.used_cut_points)
            }
            Err(e) => {
                warn!(title = %title, error = %e, "corrupt exclusion record, treating as empty");
                ExclusionHistory::default()
            }
        }
    }

    /// Append `new_points` to the title's record and persist it atomically.
    ///
    /// The record is rewritten via a temp file and rename so an interrupted
    /// process never leaves a truncated record behind. Called at most once
    /// per title per run, with the points of succeeded jobs only.
    pub async fn commit(&self, title: &str, new_points: &[CutPoint]) -> EngineResult<()> {
        if new_points.is_empty() {
            debug!(title = %title, "no new cut points to commit");
            return Ok(());
        }

        let path = self.record_path(title);

        // Reread rather than trust any in-memory copy; the record may have
        // been rebuilt or cleaned up since the batch started.
        let mut record = match fs::read(&path).await {
            Ok(raw) => serde_json::from_slice::<ExclusionRecord>(&raw).unwrap_or_else(|e| {
                warn!(title = %title, error = %e, "corrupt exclusion record, rewriting from scratch");
                ExclusionRecord::empty(title)
            }),
            Err(_) => ExclusionRecord::empty(title),
        };

        record.append(new_points.iter().copied());

        let tmp_path = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(&record)?;
        fs::write(&tmp_path, body).await?;
        fs::rename(&tmp_path, &path).await?;

        info!(
            title = %title,
            new_points = new_points.len(),
            total = record.used_cut_points.len(),
            "committed exclusion record"
        );
        Ok(())
    }
}

/// Stable, collision-resistant record filename for a title.
///
/// Similar names stay distinguishable through the hash prefix even after
/// sanitizing characters the filesystem rejects.
pub fn record_file_name(title: &str) -> String {
    let digest = Sha256::digest(title.as_bytes());
    let prefix = format!("{:x}", digest);
    format!("{}_{}.json", &prefix[..8], sanitize_title(title))
}

fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect()
}
