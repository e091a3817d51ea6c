//! Titles and episodes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One episode of a title.
///
/// Duration and geometry come from probing the source file; they are inputs
/// to planning, never recomputed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    /// Position in the title's episode sequence (0-based).
    pub index: usize,

    /// Source video file.
    pub source_path: PathBuf,

    /// Duration in seconds.
    pub duration_secs: f64,

    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Frame rate.
    pub fps: f64,
}

impl Episode {
    /// Usable runtime for a window of `window_secs` starting anywhere in this
    /// episode. Zero when the episode is shorter than the window.
    pub fn usable_secs(&self, window_secs: f64) -> f64 {
        (self.duration_secs - window_secs).max(0.0)
    }

    /// Whether a window `[start, start + window_secs)` fits inside this episode.
    pub fn fits(&self, start: f64, window_secs: f64) -> bool {
        start >= 0.0 && start + window_secs <= self.duration_secs
    }
}

/// A source title: a named, ordered sequence of episodes.
///
/// Immutable for the duration of a run; the unit of exclusion-history scoping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Title {
    pub name: String,
    pub episodes: Vec<Episode>,
}

impl Title {
    pub fn new(name: impl Into<String>, episodes: Vec<Episode>) -> Self {
        Self {
            name: name.into(),
            episodes,
        }
    }

    /// Combined duration of all episodes in seconds.
    pub fn total_duration_secs(&self) -> f64 {
        self.episodes.iter().map(|e| e.duration_secs).sum()
    }
}
