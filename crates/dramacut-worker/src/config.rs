//! Generator configuration.

use std::path::PathBuf;

use dramacut_models::{EncodeMode, EncodingConfig};

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Root directory containing one subdirectory of episodes per title.
    pub source_dir: PathBuf,
    /// Export root; each title gets its own subdirectory.
    pub output_dir: PathBuf,
    /// Scratch space for per-job temp directories.
    pub work_dir: PathBuf,
    /// Directory of per-title exclusion records.
    pub state_dir: PathBuf,
    /// Directory of normalized trailer cache entries.
    pub trailer_cache_dir: PathBuf,
    /// Trailer clip appended to every material; `None` disables the trailer.
    pub trailer_path: Option<PathBuf>,
    /// Rebuild the trailer cache entry even if present.
    pub refresh_trailer_cache: bool,

    /// Materials to generate per title.
    pub materials_per_title: usize,
    /// Shortest material duration, seconds.
    pub min_duration_secs: f64,
    /// Longest material duration, seconds.
    pub max_duration_secs: f64,
    /// Exclusion radius against used cut points, seconds.
    pub exclusion_radius_secs: f64,
    /// Random-phase attempt budget multiplier.
    pub max_attempts_multiplier: usize,
    /// Fixed planner seed for reproducible runs.
    pub seed: Option<u64>,

    /// Global worker pool size.
    pub max_concurrent_jobs: usize,
    /// Concurrently running jobs per title.
    pub per_title_concurrency: usize,
    /// Titles processed concurrently.
    pub title_parallelism: usize,

    /// Explicit canvas ("WxH" or "first"); `None` auto-detects the most
    /// common episode resolution.
    pub canvas: Option<String>,
    /// Requested output frame rate.
    pub target_fps: u32,
    /// Adapt the output fps to the source instead of forcing `target_fps`.
    pub smart_fps: bool,
    /// Prefer the hardware encoder (falls back to software on failure).
    pub use_hardware: bool,
    /// Encoding parameters.
    pub encoding: EncodingConfig,

    /// Keep per-job temp directories for debugging.
    pub keep_temp: bool,
    /// Date tag used in output file names (e.g. "9.12").
    pub date_str: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            output_dir: PathBuf::from("./exports"),
            work_dir: PathBuf::from("/tmp/dramacut"),
            state_dir: PathBuf::from("/tmp/dramacut/cut_points"),
            trailer_cache_dir: PathBuf::from("/tmp/dramacut/trailer_cache"),
            trailer_path: None,
            refresh_trailer_cache: false,
            materials_per_title: 1,
            min_duration_secs: 480.0,
            max_duration_secs: 900.0,
            exclusion_radius_secs: 30.0,
            max_attempts_multiplier: 10,
            seed: None,
            max_concurrent_jobs: 4,
            per_title_concurrency: 2,
            title_parallelism: 2,
            canvas: None,
            target_fps: 60,
            smart_fps: true,
            use_hardware: true,
            encoding: EncodingConfig::default(),
            keep_temp: false,
            date_str: None,
        }
    }
}

impl GeneratorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            source_dir: env_path("DRAMACUT_SOURCE_DIR", defaults.source_dir),
            output_dir: env_path("DRAMACUT_OUTPUT_DIR", defaults.output_dir),
            work_dir: env_path("DRAMACUT_WORK_DIR", defaults.work_dir),
            state_dir: env_path("DRAMACUT_STATE_DIR", defaults.state_dir),
            trailer_cache_dir: env_path("DRAMACUT_TRAILER_CACHE_DIR", defaults.trailer_cache_dir),
            trailer_path: std::env::var("DRAMACUT_TRAILER_FILE").ok().map(PathBuf::from),
            refresh_trailer_cache: env_flag("DRAMACUT_REFRESH_TRAILER_CACHE", false),
            materials_per_title: env_parse("DRAMACUT_COUNT", defaults.materials_per_title),
            min_duration_secs: env_parse("DRAMACUT_MIN_DURATION", defaults.min_duration_secs),
            max_duration_secs: env_parse("DRAMACUT_MAX_DURATION", defaults.max_duration_secs),
            exclusion_radius_secs: env_parse(
                "DRAMACUT_EXCLUSION_RADIUS",
                defaults.exclusion_radius_secs,
            ),
            max_attempts_multiplier: env_parse(
                "DRAMACUT_MAX_ATTEMPTS_MULTIPLIER",
                defaults.max_attempts_multiplier,
            ),
            seed: std::env::var("DRAMACUT_SEED").ok().and_then(|s| s.parse().ok()),
            max_concurrent_jobs: env_parse("DRAMACUT_MAX_JOBS", defaults.max_concurrent_jobs),
            per_title_concurrency: env_parse(
                "DRAMACUT_PER_TITLE_JOBS",
                defaults.per_title_concurrency,
            ),
            title_parallelism: env_parse("DRAMACUT_TITLE_PARALLELISM", defaults.title_parallelism),
            canvas: std::env::var("DRAMACUT_CANVAS").ok(),
            target_fps: env_parse("DRAMACUT_TARGET_FPS", defaults.target_fps),
            smart_fps: env_flag("DRAMACUT_SMART_FPS", defaults.smart_fps),
            use_hardware: env_flag("DRAMACUT_USE_HW", defaults.use_hardware),
            encoding: EncodingConfig::default(),
            keep_temp: env_flag("DRAMACUT_KEEP_TEMP", false),
            date_str: std::env::var("DRAMACUT_DATE").ok(),
        }
    }

    /// The encode mode implied by `use_hardware`.
    pub fn encode_mode(&self) -> EncodeMode {
        if self.use_hardware {
            EncodeMode::Hardware
        } else {
            EncodeMode::Software
        }
    }

    /// Reject configurations no run can make progress under.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.materials_per_title == 0 {
            return Err(WorkerError::config_error("DRAMACUT_COUNT must be at least 1"));
        }
        if self.min_duration_secs <= 0.0 || self.max_duration_secs < self.min_duration_secs {
            return Err(WorkerError::config_error(
                "duration bounds must satisfy 0 < min <= max",
            ));
        }
        if self.max_concurrent_jobs == 0 || self.per_title_concurrency == 0 {
            return Err(WorkerError::config_error("concurrency limits must be at least 1"));
        }
        if self.title_parallelism == 0 {
            return Err(WorkerError::config_error(
                "DRAMACUT_TITLE_PARALLELISM must be at least 1",
            ));
        }
        Ok(())
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}
