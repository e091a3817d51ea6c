//! Canvas/fps normalization.
//!
//! Every piece that goes into a material (the planned window and the trailer)
//! is conformed to the same canvas and frame rate so the final concat can be
//! a stream copy.

use std::path::Path;

use tracing::{info, warn};

use dramacut_models::{CanvasSpec, EncodeMode, EncodingConfig};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Default per-invocation timeout. Normalizing a single window or trailer
/// should never take longer than this.
const ENCODE_TIMEOUT_SECS: u64 = 600;

/// Scale-preserving canvas filter: fit inside the canvas, pad to exact
/// geometry, convert frame rate.
pub fn build_canvas_filter(canvas: &CanvasSpec) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,fps={fps}",
        w = canvas.width,
        h = canvas.height,
        fps = canvas.fps
    )
}

fn encode_command(
    input: &Path,
    output: &Path,
    canvas: &CanvasSpec,
    encoding: &EncodingConfig,
    mode: EncodeMode,
    trim: Option<(f64, f64)>,
) -> FfmpegCommand {
    let mut cmd = FfmpegCommand::new(input, output);
    if let Some((start, duration)) = trim {
        cmd = cmd.seek(start.max(0.0)).duration(duration.max(0.01));
    }
    cmd.video_filter(build_canvas_filter(canvas))
        .output_args(["-analyzeduration", "20M", "-probesize", "20M"])
        .output_args(["-sws_flags", "fast_bilinear"])
        .output_args(encoding.to_video_args(mode))
        .output_args(encoding.to_audio_args())
        .faststart()
}

/// Run an encode, falling back from hardware to software once.
///
/// Hardware encoders fail on machines without the relevant device or driver;
/// x264 always works, at the cost of speed.
async fn run_with_fallback(
    input: &Path,
    output: &Path,
    canvas: &CanvasSpec,
    encoding: &EncodingConfig,
    mode: EncodeMode,
    trim: Option<(f64, f64)>,
) -> MediaResult<()> {
    let runner = FfmpegRunner::new().with_timeout(ENCODE_TIMEOUT_SECS);
    let cmd = encode_command(input, output, canvas, encoding, mode, trim);

    match runner.run(&cmd).await {
        Ok(()) => Ok(()),
        Err(e) if mode == EncodeMode::Hardware => {
            warn!(error = %e, "hardware encode failed, retrying with software codec");
            let cmd = encode_command(input, output, canvas, encoding, EncodeMode::Software, trim);
            runner.run(&cmd).await
        }
        Err(e) => Err(e),
    }
}

/// Cut `[start, start + duration)` out of `input` and conform it to the canvas.
pub async fn normalize_window(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    start_secs: f64,
    duration_secs: f64,
    canvas: &CanvasSpec,
    encoding: &EncodingConfig,
    mode: EncodeMode,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    info!(
        "Normalizing window: {} [{:.1}s +{:.1}s] -> {}",
        input.display(),
        start_secs,
        duration_secs,
        output.display()
    );

    run_with_fallback(
        input,
        output,
        canvas,
        encoding,
        mode,
        Some((start_secs, duration_secs)),
    )
    .await
}

/// Conform a whole trailer clip to the canvas.
pub async fn normalize_trailer(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    canvas: &CanvasSpec,
    encoding: &EncodingConfig,
    mode: EncodeMode,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    info!(
        "Normalizing trailer: {} -> {}",
        input.display(),
        output.display()
    );

    run_with_fallback(input, output, canvas, encoding, mode, None).await
}
