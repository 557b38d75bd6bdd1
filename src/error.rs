use std::path::PathBuf;

use thiserror::Error;

/// Application-level failure: an SDK error or bad local input.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Sdk(#[from] safe_sdk::Error),

    #[error("config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("invalid input: {0}")]
    Input(String),
}

impl AppError {
    /// Whether repeating the same command could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Sdk(e) => e.is_retryable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
