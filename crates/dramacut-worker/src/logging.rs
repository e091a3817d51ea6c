//! Structured material logging.

use tracing::{error, info, warn};

/// Logger carrying the title and material index through a job's lifecycle.
#[derive(Debug, Clone)]
pub struct MaterialLogger {
    title: String,
    material_idx: usize,
}

impl MaterialLogger {
    pub fn new(title: &str, material_idx: usize) -> Self {
        Self {
            title: title.to_string(),
            material_idx,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            title = %self.title,
            material = self.material_idx,
            "Material started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            title = %self.title,
            material = self.material_idx,
            "Material progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            title = %self.title,
            material = self.material_idx,
            "Material warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            title = %self.title,
            material = self.material_idx,
            "Material error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            title = %self.title,
            material = self.material_idx,
            "Material completed: {}", message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_creation() {
        let logger = MaterialLogger::new("demo", 2);
        assert_eq!(logger.title, "demo");
        assert_eq!(logger.material_idx, 2);
    }
}
