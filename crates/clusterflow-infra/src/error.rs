//! Infra collaborator error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InfraError {
    #[error("tofu not found in PATH")]
    TofuNotFound,

    #[error("tofu command failed: {0}")]
    TofuFailed(String),

    #[error("ssh not found in PATH")]
    SshNotFound,

    #[error("remote command on {host} failed: {detail}")]
    RemoteFailed { host: String, detail: String },

    #[error("call timed out after {0}s")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InfraError>;
