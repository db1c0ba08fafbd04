//! Phase descriptors and the handler seam
//!
//! A workflow is a finite, totally ordered list of [`Phase`] descriptors.
//! Each phase wraps a precondition probe, an idempotent action and a
//! static failure-severity policy. The descriptors are immutable once the
//! list is constructed for a run; all mutable state lives in the
//! executor's report.

use crate::context::ExecutionContext;
use crate::error::{PhaseError, ProbeError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Failure severity policy of a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// A failure halts the remaining phases in the run
    Fatal,
    /// A failure is recorded and the run continues
    Warn,
}

/// Whether a phase's action is skipped when the probe reports the
/// desired state already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyPolicy {
    /// Skip the action if the probe reports the resource present
    SkipIfPresent,
    /// Always run the action; the action itself must be re-invocable
    AlwaysRun,
}

/// Per-run status of a phase.
///
/// Terminal states are never re-entered within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    Running,
    /// Probe reported the desired state already exists
    Skipped,
    /// Dry-run: the action was logged, not applied
    Simulated,
    Succeeded,
    FailedWarn,
    FailedFatal,
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseStatus::Pending => write!(f, "PENDING"),
            PhaseStatus::Running => write!(f, "RUNNING"),
            PhaseStatus::Skipped => write!(f, "SKIPPED"),
            PhaseStatus::Simulated => write!(f, "SKIPPED (simulated)"),
            PhaseStatus::Succeeded => write!(f, "SUCCEEDED"),
            PhaseStatus::FailedWarn => write!(f, "FAILED (warn)"),
            PhaseStatus::FailedFatal => write!(f, "FAILED (fatal)"),
        }
    }
}

/// Observed state of a probed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    /// Present and fully functional
    Ready,
    /// Present, readiness not evaluated
    Present,
    /// Present but not fully functional
    Degraded,
    /// Deletion in progress
    Terminating,
    Absent,
    /// The probe could not determine the state
    Unknown,
}

impl ResourceState {
    /// Whether the resource exists in (at least) the desired state.
    /// `Degraded` counts as present: the action already ran once and a
    /// re-run would not converge it, that is verification's job.
    pub fn is_present(&self) -> bool {
        matches!(
            self,
            ResourceState::Ready | ResourceState::Present | ResourceState::Degraded
        )
    }

    pub fn is_absent(&self) -> bool {
        *self == ResourceState::Absent
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceState::Ready => write!(f, "ready"),
            ResourceState::Present => write!(f, "present"),
            ResourceState::Degraded => write!(f, "degraded"),
            ResourceState::Terminating => write!(f, "terminating"),
            ResourceState::Absent => write!(f, "absent"),
            ResourceState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of a precondition probe, produced and consumed within a single
/// phase evaluation
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Identifier of the probed resource
    pub resource: String,

    /// Observed state
    pub state: ResourceState,

    /// Free-form detail (version, replica counts, error text)
    pub detail: Option<String>,
}

impl ProbeResult {
    pub fn new(resource: impl Into<String>, state: ResourceState) -> Self {
        Self {
            resource: resource.into(),
            state,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Probe outcome for a resource whose state could not be determined.
    /// The calling phase decides how to proceed, typically by attempting
    /// the action and tolerating "already exists".
    pub fn unknown(resource: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(resource, ResourceState::Unknown).with_detail(detail)
    }

    pub fn exists(&self) -> bool {
        self.state.is_present()
    }
}

/// The probe + action pair behind a phase.
///
/// `probe` must be read-only. `apply` and `remove` must be safe to
/// re-invoke: the probe result determines skip vs. execute, never both.
#[async_trait]
pub trait PhaseHandler: Send + Sync {
    /// Query the external system for the resource's current state
    async fn probe(&self, ctx: &ExecutionContext) -> Result<ProbeResult, ProbeError>;

    /// Bring the resource into the desired state
    async fn apply(&self, ctx: &ExecutionContext) -> Result<(), PhaseError>;

    /// Gracefully remove the resource (teardown direction)
    async fn remove(&self, ctx: &ExecutionContext) -> Result<(), PhaseError>;

    /// Last-resort cleanup for a resource stuck terminating beyond the
    /// bounded wait. Default: nothing more to do.
    async fn force_remove(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
        Ok(())
    }
}

/// A single ordered unit of provisioning/teardown work
#[derive(Clone)]
pub struct Phase {
    /// Phase name, unique within a workflow
    pub name: String,

    /// Human-readable description of the action, used for dry-run output
    pub description: String,

    pub severity: Severity,
    pub idempotency: IdempotencyPolicy,

    /// Requires the confirmation gate in interactive apply mode
    pub destructive: bool,

    /// Removal destroys persisted data; skipped by teardown --preserve-data
    pub data_destructive: bool,

    pub handler: Arc<dyn PhaseHandler>,
}

impl Phase {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn PhaseHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            severity: Severity::Fatal,
            idempotency: IdempotencyPolicy::SkipIfPresent,
            destructive: false,
            data_destructive: false,
            handler,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn warn_on_failure(self) -> Self {
        self.with_severity(Severity::Warn)
    }

    pub fn always_run(mut self) -> Self {
        self.idempotency = IdempotencyPolicy::AlwaysRun;
        self
    }

    pub fn destructive(mut self) -> Self {
        self.destructive = true;
        self
    }

    /// Marks removal as data-destroying. Implies `destructive`.
    pub fn data_destructive(mut self) -> Self {
        self.destructive = true;
        self.data_destructive = true;
        self
    }
}

impl std::fmt::Debug for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Phase")
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("destructive", &self.destructive)
            .field("data_destructive", &self.data_destructive)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl PhaseHandler for Noop {
        async fn probe(&self, _ctx: &ExecutionContext) -> Result<ProbeResult, ProbeError> {
            Ok(ProbeResult::new("noop", ResourceState::Absent))
        }

        async fn apply(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
            Ok(())
        }

        async fn remove(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
            Ok(())
        }
    }

    #[test]
    fn test_phase_defaults() {
        let phase = Phase::new("networking", "install CNI", Arc::new(Noop));
        assert_eq!(phase.severity, Severity::Fatal);
        assert_eq!(phase.idempotency, IdempotencyPolicy::SkipIfPresent);
        assert!(!phase.destructive);
    }

    #[test]
    fn test_data_destructive_implies_destructive() {
        let phase = Phase::new("storage", "install storage", Arc::new(Noop)).data_destructive();
        assert!(phase.destructive);
        assert!(phase.data_destructive);
    }

    #[test]
    fn test_degraded_counts_as_present() {
        assert!(ResourceState::Degraded.is_present());
        assert!(!ResourceState::Terminating.is_present());
        assert!(!ResourceState::Unknown.is_present());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(PhaseStatus::Simulated.to_string(), "SKIPPED (simulated)");
        assert_eq!(PhaseStatus::FailedWarn.to_string(), "FAILED (warn)");
    }
}
