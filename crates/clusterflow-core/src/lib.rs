//! ClusterFlow Orchestration Core
//!
//! This crate provides the phase orchestration engine for ClusterFlow:
//! an ordered list of phase descriptors consumed by a single executor,
//! with idempotency probes, confirmation gates, dry-run simulation and
//! fatal/warn severity classification.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                ClusterFlow CLI                   │
//! │          (cflow rebuild/teardown/...)            │
//! └─────────────────┬───────────────────────────────┘
//!                   │ Vec<Phase> + ExecutionContext
//! ┌─────────────────▼───────────────────────────────┐
//! │              clusterflow-core                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  Executor (forward / reverse)             │   │
//! │  │  probe → gate → dry-run → apply/remove    │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────────┐    │
//! │  │  Confirm │ │   Poll   │ │   RunLock    │    │
//! │  └──────────┘ └──────────┘ └──────────────┘    │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod confirm;
pub mod context;
pub mod error;
pub mod executor;
pub mod lock;
pub mod phase;
pub mod poll;

// Re-exports
pub use confirm::{ConfirmationGate, StdinGate};
pub use context::{ExecutionContext, ExecutionMode};
pub use error::{CoreError, PhaseError, ProbeError, Result};
pub use executor::{Executor, ExecutorOptions, PhaseOutcome, RunReport, RunStatus};
pub use lock::RunLock;
pub use phase::{
    IdempotencyPolicy, Phase, PhaseHandler, PhaseStatus, ProbeResult, ResourceState, Severity,
};
pub use poll::{poll_until, retry_probe, PollConfig, PollOutcome, RetryConfig};
