//! Material generation worker.
//!
//! This crate provides:
//! - The bounded job scheduler and per-material FFmpeg pipeline
//! - The generation orchestrator (plan, run, commit, report)
//! - Title discovery from a source directory tree
//! - Status sink boundary and env-driven configuration

pub mod config;
pub mod discover;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod scheduler;
pub mod status;

pub use config::GeneratorConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::MaterialLogger;
pub use orchestrator::GenerationOrchestrator;
pub use pipeline::MaterialPipeline;
pub use scheduler::{JobScheduler, MaterialRunner};
pub use status::{LogStatusSink, StatusSink};
