//! Metric recording helpers.
//!
//! Thin wrappers over the `metrics` facade so call sites stay one-liners and
//! metric names live in one place. No exporter is installed here; the
//! embedding process may register a recorder.

use metrics::{counter, histogram};

/// Metric names.
pub mod names {
    pub const MATERIALS_TOTAL: &str = "dramacut_materials_total";
    pub const MATERIAL_DURATION_SECONDS: &str = "dramacut_material_duration_seconds";
    pub const PLANNING_SHORTFALL_TOTAL: &str = "dramacut_planning_shortfall_total";
    pub const EXCLUSION_COMMITS_TOTAL: &str = "dramacut_exclusion_commits_total";
}

/// Record a finished material job.
pub fn record_material(success: bool, duration_secs: f64) {
    let outcome = if success { "succeeded" } else { "failed" };
    counter!(names::MATERIALS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::MATERIAL_DURATION_SECONDS).record(duration_secs);
}

/// Record a planner that produced fewer windows than requested.
pub fn record_planning_shortfall(missing: usize) {
    counter!(names::PLANNING_SHORTFALL_TOTAL).increment(missing as u64);
}

/// Record one exclusion-record commit.
pub fn record_commit() {
    counter!(names::EXCLUSION_COMMITS_TOTAL).increment(1);
}
