//! Control plane client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KubeError {
    #[error("kubectl not found in PATH")]
    KubectlNotFound,

    #[error("kubectl command failed: {0}")]
    CommandFailed(String),

    #[error("call timed out after {0}s")]
    Timeout(u64),

    #[error("unexpected kubectl output: {0}")]
    UnexpectedOutput(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KubeError>;
