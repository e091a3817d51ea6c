//! Material generation binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dramacut_media::{check_ffmpeg, check_ffprobe};
use dramacut_worker::discover::{load_title, scan_title_dirs};
use dramacut_worker::{GenerationOrchestrator, GeneratorConfig, LogStatusSink};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("dramacut_worker=info".parse().unwrap())
        .add_directive("dramacut_engine=info".parse().unwrap())
        .add_directive("dramacut_media=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting dramacut");

    let config = GeneratorConfig::from_env();
    info!("Generator config: {:?}", config);

    // The run is pointless without the external encoder on PATH.
    if let Err(e) = check_ffmpeg() {
        error!("{}", e);
        std::process::exit(1);
    }
    if let Err(e) = check_ffprobe() {
        error!("{}", e);
        std::process::exit(1);
    }

    let orchestrator = match GenerationOrchestrator::new(
        config.clone(),
        Arc::new(LogStatusSink),
        None,
    ) {
        Ok(orchestrator) => Arc::new(orchestrator),
        Err(e) => {
            error!("Failed to create orchestrator: {}", e);
            std::process::exit(1);
        }
    };

    // Discover titles under the source root
    let title_dirs = match scan_title_dirs(&config.source_dir) {
        Ok(dirs) => dirs,
        Err(e) => {
            error!("Failed to scan source directory: {}", e);
            std::process::exit(1);
        }
    };

    let mut titles = Vec::new();
    for dir in title_dirs {
        match load_title(&dir).await {
            Ok(title) if !title.episodes.is_empty() => titles.push(title),
            Ok(title) => warn!(title = %title.name, "no probeable episodes, skipping"),
            Err(e) => warn!(dir = %dir.display(), error = %e, "failed to load title"),
        }
    }

    if titles.is_empty() {
        warn!("No titles to process");
        return;
    }
    info!("Processing {} titles", titles.len());

    // Let in-flight jobs finish on ctrl-c; interrupted batches skip commit.
    let shutdown_handle = Arc::clone(&orchestrator);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_handle.shutdown();
    });

    let summary = orchestrator.run(titles).await;

    info!(
        "Run complete: {}/{} materials across {} titles",
        summary.total_succeeded(),
        summary.total_planned(),
        summary.titles.len()
    );
    for title in &summary.titles {
        match &title.error {
            Some(e) => info!("  {} failed: {}", title.title_name, e),
            None => info!(
                "  {}: {}/{} succeeded{}",
                title.title_name,
                title.succeeded,
                title.planned,
                if title.committed { "" } else { " (uncommitted)" }
            ),
        }
    }
}
