//! Cut-point planning and deduplication engine.
//!
//! This crate provides:
//! - The persistent per-title exclusion store (used cut points)
//! - The content-keyed trailer normalization cache with single-flight locking
//! - The cut-point planner (guided and random candidate supply)
//! - The scene-scorer guidance boundary

pub mod error;
pub mod exclusion;
pub mod guidance;
pub mod planner;
pub mod trailer_cache;

pub use error::{EngineError, EngineResult};
pub use exclusion::{ExclusionHistory, ExclusionStore};
pub use guidance::{SamplingPolicy, SceneScorer, ScoredCandidate};
pub use planner::{CutPointPlanner, PlannerConfig};
pub use trailer_cache::{TrailerCache, TrailerNormalizer, TrailerSpec};
