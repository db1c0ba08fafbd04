//! Helm wrapper error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelmError {
    #[error("helm not found in PATH")]
    HelmNotFound,

    #[error("helm command failed: {0}")]
    CommandFailed(String),

    #[error("call timed out after {0}s")]
    Timeout(u64),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HelmError>;
