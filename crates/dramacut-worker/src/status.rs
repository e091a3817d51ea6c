//! Status sink boundary.
//!
//! The orchestrator reports per-title events through this trait and never
//! learns how they are delivered. Sink failures are logged by the caller and
//! never fail generation.

use async_trait::async_trait;
use tracing::info;

use dramacut_models::StatusEvent;

/// Receiver of per-title generation events.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn report(&self, title: &str, event: &StatusEvent) -> anyhow::Result<()>;
}

/// Sink that renders events as log lines. The default when no external
/// integration is configured.
#[derive(Debug, Default)]
pub struct LogStatusSink;

#[async_trait]
impl StatusSink for LogStatusSink {
    async fn report(&self, title: &str, event: &StatusEvent) -> anyhow::Result<()> {
        match event {
            StatusEvent::BatchStarted { planned } => {
                info!(title = %title, planned, "batch started");
            }
            StatusEvent::MaterialSucceeded { material_idx, output } => {
                info!(
                    title = %title,
                    material = material_idx,
                    output = %output.display(),
                    "material succeeded"
                );
            }
            StatusEvent::MaterialFailed { material_idx, reason } => {
                info!(
                    title = %title,
                    material = material_idx,
                    reason = %reason,
                    "material failed"
                );
            }
            StatusEvent::BatchCompleted {
                planned,
                succeeded,
                failed,
            } => {
                info!(
                    title = %title,
                    planned,
                    succeeded,
                    failed,
                    "batch completed"
                );
            }
        }
        Ok(())
    }
}
