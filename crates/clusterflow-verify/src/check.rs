//! Check types
//!
//! A check is an independent, read-only assertion about system health.
//! `fail` means the system is non-functional for its primary purpose;
//! `warn` means degraded but functioning; everything else passes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "pass"),
            CheckStatus::Warn => write!(f, "warn"),
            CheckStatus::Fail => write!(f, "fail"),
        }
    }
}

/// One check's classified outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub category: String,
    pub status: CheckStatus,
    pub detail: String,
}

/// Status + detail returned by a check body
#[derive(Debug, Clone)]
pub struct Verdict {
    pub status: CheckStatus,
    pub detail: String,
}

impl Verdict {
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Pass,
            detail: detail.into(),
        }
    }

    pub fn warn(detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Fail,
            detail: detail.into(),
        }
    }
}

/// A check body failed to execute at all.
///
/// The engine converts this into a fail-status result; it is never
/// thrown past the engine.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct CheckError(pub String);

impl From<clusterflow_kube::KubeError> for CheckError {
    fn from(e: clusterflow_kube::KubeError) -> Self {
        Self(e.to_string())
    }
}

impl From<clusterflow_helm::HelmError> for CheckError {
    fn from(e: clusterflow_helm::HelmError) -> Self {
        Self(e.to_string())
    }
}

/// An independent, read-only, idempotent health assertion
#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> &str;

    /// Grouping key for the text rendering
    fn category(&self) -> &str;

    /// Included in `verify --quick`
    fn quick(&self) -> bool {
        false
    }

    async fn run(&self) -> Result<Verdict, CheckError>;
}
