//! Orchestrator error types

use thiserror::Error;

/// A read-only probe could not determine the state of a resource.
///
/// Probes are retried with a bounded fixed backoff before this surfaces;
/// a persistent probe failure is treated as "unknown state" by the
/// executor, never as a phase failure on its own.
#[derive(Error, Debug, Clone)]
#[error("probe of '{resource}' failed: {detail}")]
pub struct ProbeError {
    /// Resource the probe was inspecting
    pub resource: String,

    /// Underlying error detail
    pub detail: String,
}

impl ProbeError {
    pub fn new(resource: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            detail: detail.into(),
        }
    }
}

/// A phase action failed.
///
/// The executor classifies this by the phase's static severity policy:
/// `fatal` halts the run, `warn` is recorded and the run continues.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct PhaseError(pub String);

impl PhaseError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }
}

impl From<std::io::Error> for PhaseError {
    fn from(e: std::io::Error) -> Self {
        Self(e.to_string())
    }
}

/// Orchestrator errors
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("phase '{phase}' failed: {detail}")]
    PhaseFailed { phase: String, detail: String },

    #[error("operation declined by user")]
    ConfirmationDeclined,

    #[error("run cancelled")]
    Cancelled,

    #[error("another run is in progress: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
