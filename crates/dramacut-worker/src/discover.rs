//! Title discovery and canvas selection.
//!
//! A source root holds one subdirectory per title, each containing numbered
//! episode files. Probing supplies durations and geometry; episodes that
//! fail to probe are skipped with a warning rather than sinking the title.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use dramacut_media::probe_video;
use dramacut_models::{encoding::even, Episode, Title};

use crate::error::{WorkerError, WorkerResult};

const EPISODE_EXTENSION: &str = "mp4";

/// Directory names that are never titles.
const EXCLUDED_DIR_NAMES: &[&str] = &["exports", "_exports"];

/// Scan the source root for title directories (subdirectories holding at
/// least one episode file), sorted by name.
pub fn scan_title_dirs(root: &Path) -> WorkerResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root)
        .map_err(|e| WorkerError::discovery_failed(format!("{}: {}", root.display(), e)))?
    {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if !path.is_dir() || name.starts_with('.') {
            continue;
        }
        if EXCLUDED_DIR_NAMES.contains(&name.to_lowercase().as_str()) {
            continue;
        }
        if !list_episode_files(&path).is_empty() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// List episode files in a title directory, sorted by numeric stem.
///
/// Files with non-numeric stems sort after the numbered ones, by name.
pub fn list_episode_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case(EPISODE_EXTENSION))
                    .unwrap_or(false)
            })
            .collect(),
        Err(_) => return Vec::new(),
    };

    files.sort_by_key(|path| {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        match stem.parse::<u64>() {
            Ok(n) => (0, n, stem),
            Err(_) => (1, 0, stem),
        }
    });

    files
}

/// Load a title: list its episodes and probe each one.
pub async fn load_title(dir: &Path) -> WorkerResult<Title> {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| WorkerError::discovery_failed("title directory has no name"))?;

    let mut episodes = Vec::new();
    for path in list_episode_files(dir) {
        match probe_video(&path).await {
            Ok(info) if info.duration > 0.0 => {
                episodes.push(Episode {
                    index: episodes.len(),
                    source_path: path,
                    duration_secs: info.duration,
                    width: info.width,
                    height: info.height,
                    fps: info.fps,
                });
            }
            Ok(_) => {
                warn!(episode = %path.display(), "episode has no duration, skipping");
            }
            Err(e) => {
                warn!(episode = %path.display(), error = %e, "failed to probe episode, skipping");
            }
        }
    }

    info!(title = %name, episodes = episodes.len(), "loaded title");
    Ok(Title::new(name, episodes))
}

/// Resolve the reference resolution for a title.
///
/// `canvas` accepts `"first"` (first episode's geometry) or `"WxH"`; with no
/// setting the most common episode resolution wins.
pub fn pick_reference_resolution(
    episodes: &[Episode],
    canvas: Option<&str>,
) -> WorkerResult<(u32, u32)> {
    match canvas {
        Some(spec) if spec.eq_ignore_ascii_case("first") => {
            let first = episodes
                .first()
                .ok_or_else(|| WorkerError::discovery_failed("title has no episodes"))?;
            Ok((even(first.width), even(first.height)))
        }
        Some(spec) => {
            let (w, h) = spec
                .to_lowercase()
                .split_once('x')
                .and_then(|(w, h)| Some((w.trim().parse::<u32>().ok()?, h.trim().parse::<u32>().ok()?)))
                .ok_or_else(|| {
                    WorkerError::config_error(format!("canvas must be 'first' or 'WxH', got '{}'", spec))
                })?;
            Ok((even(w), even(h)))
        }
        None => {
            let mut counts: HashMap<(u32, u32), usize> = HashMap::new();
            for ep in episodes {
                if ep.width > 0 && ep.height > 0 {
                    *counts.entry((even(ep.width), even(ep.height))).or_default() += 1;
                }
            }
            counts
                .into_iter()
                // Deterministic winner on count ties
                .max_by_key(|((w, h), count)| (*count, *w, *h))
                .map(|(size, _)| size)
                .ok_or_else(|| WorkerError::discovery_failed("no probeable episode resolution"))
        }
    }
}

/// Pick the output frame rate.
///
/// Smart mode follows the source: below 40 fps materials keep the source
/// rate, faster sources are capped at 45.
pub fn choose_output_fps(episodes: &[Episode], requested_fps: u32, smart: bool) -> u32 {
    if !smart {
        return requested_fps;
    }

    let src_fps = episodes.iter().map(|e| e.fps).find(|fps| *fps > 0.0);
    match src_fps {
        Some(fps) if fps < 40.0 => fps.round() as u32,
        Some(_) => 45,
        None => requested_fps,
    }
}
