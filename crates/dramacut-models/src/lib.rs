//! Shared data models for the dramacut material generator.
//!
//! This crate provides Serde-serializable types for:
//! - Titles and episodes
//! - Cut points and persisted exclusion records
//! - Candidate windows produced by planning
//! - Material jobs and their results
//! - Encoding and canvas configuration
//! - Batch status events and run summaries

pub mod cut_point;
pub mod encoding;
pub mod job;
pub mod report;
pub mod timestamp;
pub mod title;
pub mod window;

// Re-export common types
pub use cut_point::{CutPoint, ExclusionRecord};
pub use encoding::{CanvasSpec, EncodeMode, EncodingConfig};
pub use job::{JobId, JobOutcome, JobResult, JobState, MaterialJob};
pub use report::{RunSummary, StatusEvent, TitleSummary};
pub use timestamp::{format_seconds, human_duration};
pub use title::{Episode, Title};
pub use window::{CandidateWindow, WindowSource};
