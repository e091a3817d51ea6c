//! Concat-demuxer stitching.

use std::path::Path;

use tokio::fs;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

const CONCAT_TIMEOUT_SECS: u64 = 300;

/// Write an ffconcat file list for the concat demuxer.
///
/// Single quotes in paths are escaped the way the demuxer expects.
pub async fn write_ffconcat_list(paths: &[impl AsRef<Path>], list_path: impl AsRef<Path>) -> MediaResult<()> {
    let mut body = String::new();
    for p in paths {
        let escaped = p.as_ref().to_string_lossy().replace('\'', r"\'");
        body.push_str(&format!("file '{}'\n", escaped));
    }
    fs::write(list_path.as_ref(), body).await?;
    Ok(())
}

/// Concatenate pre-normalized parts with a stream copy.
///
/// All inputs must already share codec, canvas and frame rate.
pub async fn concat_copy(list_path: impl AsRef<Path>, output: impl AsRef<Path>) -> MediaResult<()> {
    let list_path = list_path.as_ref();
    let output = output.as_ref();

    info!("Concatenating {} -> {}", list_path.display(), output.display());

    let cmd = FfmpegCommand::new(list_path, output)
        .input_args(["-f", "concat", "-safe", "0"])
        .codec_copy()
        .faststart();

    FfmpegRunner::new()
        .with_timeout(CONCAT_TIMEOUT_SECS)
        .run(&cmd)
        .await
}

/// Final remux with `+faststart` so players can start before the download ends.
pub async fn finalize_faststart(input: impl AsRef<Path>, output: impl AsRef<Path>) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(input.as_ref(), output.as_ref())
        .codec_copy()
        .faststart();

    FfmpegRunner::new()
        .with_timeout(CONCAT_TIMEOUT_SECS)
        .run(&cmd)
        .await
}
