//! Per-material FFmpeg pipeline.
//!
//! One job turns a planned window into a finished material: normalize the
//! window to the canvas, fetch the cached normalized trailer, stitch, remux
//! with faststart and move the result into the title's export directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use dramacut_engine::{EngineError, EngineResult, TrailerCache, TrailerNormalizer, TrailerSpec};
use dramacut_media::{
    concat_copy, finalize_faststart, move_file, normalize_trailer, normalize_window,
    write_ffconcat_list,
};
use dramacut_models::{human_duration, CanvasSpec, EncodeMode, EncodingConfig, MaterialJob};

use crate::config::GeneratorConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::MaterialLogger;
use crate::scheduler::MaterialRunner;

/// Trailer normalizer backed by the FFmpeg wrapper.
pub struct FfmpegTrailerNormalizer {
    encoding: EncodingConfig,
}

impl FfmpegTrailerNormalizer {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self { encoding }
    }
}

#[async_trait]
impl TrailerNormalizer for FfmpegTrailerNormalizer {
    async fn normalize(&self, source: &Path, spec: &TrailerSpec, dest: &Path) -> EngineResult<()> {
        normalize_trailer(source, dest, &spec.canvas, &self.encoding, spec.encode_mode)
            .await
            .map_err(|e| EngineError::normalization(e.to_string()))
    }
}

/// Production [`MaterialRunner`].
pub struct MaterialPipeline {
    canvas: CanvasSpec,
    encoding: EncodingConfig,
    encode_mode: EncodeMode,
    trailer_path: Option<PathBuf>,
    trailer_cache: TrailerCache,
    normalizer: FfmpegTrailerNormalizer,
    // An operator-requested cache rebuild applies to the first job that
    // reaches the cache, not to every job of the run. Shared across the
    // per-title pipelines of one run.
    refresh_pending: Arc<AtomicBool>,
    work_dir: PathBuf,
    output_dir: PathBuf,
    keep_temp: bool,
    date_str: Option<String>,
}

impl MaterialPipeline {
    pub fn new(
        config: &GeneratorConfig,
        canvas: CanvasSpec,
        trailer_cache: TrailerCache,
        refresh_pending: Arc<AtomicBool>,
    ) -> Self {
        Self {
            canvas,
            encoding: config.encoding.clone(),
            encode_mode: config.encode_mode(),
            trailer_path: config.trailer_path.clone(),
            trailer_cache,
            normalizer: FfmpegTrailerNormalizer::new(config.encoding.clone()),
            refresh_pending,
            work_dir: config.work_dir.clone(),
            output_dir: config.output_dir.clone(),
            keep_temp: config.keep_temp,
            date_str: config.date_str.clone(),
        }
    }

    /// Export filename for a job, e.g. `9.12-晚风十里-03.mp4`.
    fn output_basename(&self, job: &MaterialJob) -> String {
        match &self.date_str {
            Some(date) => format!("{}-{}-{:02}.mp4", date, job.title_name, job.material_idx),
            None => format!("{}-{:02}.mp4", job.title_name, job.material_idx),
        }
    }

    async fn run_inner(&self, job: &MaterialJob) -> WorkerResult<PathBuf> {
        let started = Instant::now();
        let logger = MaterialLogger::new(&job.title_name, job.material_idx);
        let window = &job.window;

        logger.log_start(&format!(
            "episode {} [{:.1}s +{:.1}s]",
            window.episode_idx + 1,
            window.start_secs,
            window.duration_secs()
        ));

        let temp = tempfile::Builder::new()
            .prefix("mat_")
            .tempdir_in(&self.work_dir)
            .map_err(|e| WorkerError::job_failed(format!("cannot allocate work dir: {}", e)))?;

        // 1. Cut the window out of its episode and conform it to the canvas.
        let main_part = temp.path().join("main.mp4");
        normalize_window(
            &job.source_path,
            &main_part,
            window.start_secs,
            window.duration_secs(),
            &self.canvas,
            &self.encoding,
            self.encode_mode,
        )
        .await?;

        // 2. Attach the shared normalized trailer, if configured.
        let stitched = if let Some(trailer_src) = &self.trailer_path {
            let spec = TrailerSpec {
                canvas: self.canvas,
                encode_mode: self.encode_mode,
            };
            let force_refresh = self.refresh_pending.swap(false, Ordering::SeqCst);
            let trailer = self
                .trailer_cache
                .get_or_create(trailer_src, &spec, &self.normalizer, force_refresh)
                .await?;
            logger.log_progress("appending trailer");

            let list = temp.path().join("parts.txt");
            write_ffconcat_list(&[main_part.as_path(), trailer.as_path()], &list).await?;
            let stitched = temp.path().join("stitched.mp4");
            concat_copy(&list, &stitched).await?;
            stitched
        } else {
            let finalized = temp.path().join("final.mp4");
            finalize_faststart(&main_part, &finalized).await?;
            finalized
        };

        // 3. Move into the export tree (work dir may be another filesystem).
        let out_path = self
            .output_dir
            .join(&job.title_name)
            .join(self.output_basename(job));
        move_file(&stitched, &out_path).await?;

        if self.keep_temp {
            let kept = temp.into_path();
            logger.log_progress(&format!("keeping work dir {}", kept.display()));
        }

        logger.log_completion(&format!(
            "output {} in {}",
            out_path.display(),
            human_duration(started.elapsed().as_secs_f64())
        ));
        Ok(out_path)
    }
}

#[async_trait]
impl MaterialRunner for MaterialPipeline {
    async fn run(&self, job: &MaterialJob) -> WorkerResult<PathBuf> {
        let started = Instant::now();
        let result = self.run_inner(job).await;
        crate::metrics::record_material(result.is_ok(), started.elapsed().as_secs_f64());
        result
    }
}
