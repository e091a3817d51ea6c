//! Engine error types.

use std::path::PathBuf;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("state directory unavailable: {0}")]
    StateDirUnavailable(PathBuf),

    #[error("cache directory unavailable: {0}")]
    CacheDirUnavailable(PathBuf),

    #[error("trailer source not found: {0}")]
    TrailerNotFound(PathBuf),

    #[error("trailer normalization failed: {0}")]
    Normalization(String),

    #[error("guidance source failed: {0}")]
    Guidance(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn normalization(msg: impl Into<String>) -> Self {
        Self::Normalization(msg.into())
    }

    pub fn guidance(msg: impl Into<String>) -> Self {
        Self::Guidance(msg.into())
    }
}
