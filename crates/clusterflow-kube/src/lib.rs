//! ClusterFlow control plane client
//!
//! Typed access to the cluster control plane via the kubectl CLI.
//! Every call runs with a per-call timeout; probes are read-only by
//! construction.

pub mod error;
pub mod kubectl;

// Re-exports
pub use error::{KubeError, Result};
pub use kubectl::{KubeClient, NamespaceState, NodeInfo, PodInfo, WorkloadStatus};
