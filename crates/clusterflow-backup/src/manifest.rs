//! Backup manifest
//!
//! One manifest per backup run, written after every collection has been
//! attempted: invocation time, host identity, per-collection status and
//! total exported size. A manifest with error entries is a valid,
//! partial backup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One exported resource collection.
///
/// `items == 0` is a valid result (the collection was empty), distinct
/// from `error.is_some()` (the export failed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Collection name (e.g. "deployments")
    pub collection: String,

    /// Export file name inside the backup directory
    pub file: String,

    /// Number of exported resources
    pub items: u32,

    /// Export file size
    pub size_bytes: u64,

    /// Captured error detail, if the export failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Snapshot {
    pub fn ok(collection: &str, file: &str, items: u32, size_bytes: u64) -> Self {
        Self {
            collection: collection.to_string(),
            file: file.to_string(),
            items,
            size_bytes,
            error: None,
        }
    }

    pub fn failed(collection: &str, file: &str, error: impl Into<String>) -> Self {
        Self {
            collection: collection.to_string(),
            file: file.to_string(),
            items: 0,
            size_bytes: 0,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of a whole backup run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    /// When the backup was invoked
    pub created_at: DateTime<Utc>,

    /// Host the backup ran on
    pub host: String,

    /// Cluster the backup was taken from
    pub cluster: String,

    pub tool_version: String,

    /// Requested scope ("all", "cluster", "apps")
    pub scope: String,

    /// Whether secret material was included
    pub include_sensitive: bool,

    pub snapshots: Vec<Snapshot>,

    pub total_size_bytes: u64,

    /// True only if every collection exported cleanly
    pub complete: bool,
}

impl BackupManifest {
    pub fn new(
        cluster: &str,
        scope: &str,
        include_sensitive: bool,
        snapshots: Vec<Snapshot>,
    ) -> Self {
        let total_size_bytes = snapshots.iter().map(|s| s.size_bytes).sum();
        let complete = snapshots.iter().all(|s| s.is_ok());

        Self {
            created_at: Utc::now(),
            host: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            cluster: cluster.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            scope: scope.to_string(),
            include_sensitive,
            snapshots,
            total_size_bytes,
            complete,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.snapshots.iter().filter(|s| s.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.snapshots.len() - self.succeeded()
    }

    /// Write the manifest into the backup directory
    pub fn write(&self, dir: &Path) -> crate::error::Result<()> {
        let path = dir.join("backup-manifest.json");
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)
            .map_err(|e| crate::error::BackupError::Manifest(e.to_string()))?;
        tracing::debug!(path = %path.display(), "Wrote backup manifest");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_aggregates() {
        let manifest = BackupManifest::new(
            "lab",
            "all",
            false,
            vec![
                Snapshot::ok("deployments", "deployments.yaml", 12, 4096),
                Snapshot::failed("secrets", "secrets.yaml", "forbidden"),
                Snapshot::ok("namespaces", "namespaces.yaml", 0, 128),
            ],
        );

        assert_eq!(manifest.succeeded(), 2);
        assert_eq!(manifest.failed(), 1);
        assert_eq!(manifest.total_size_bytes, 4224);
        assert!(!manifest.complete);
    }

    #[test]
    fn test_empty_collection_is_not_a_failure() {
        let snapshot = Snapshot::ok("crds", "crds.yaml", 0, 64);
        assert!(snapshot.is_ok());
        assert_eq!(snapshot.items, 0);
    }

    #[test]
    fn test_manifest_roundtrip() {
        let manifest = BackupManifest::new(
            "lab",
            "cluster",
            true,
            vec![Snapshot::ok("nodes", "nodes.yaml", 3, 900)],
        );

        let json = serde_json::to_string(&manifest).unwrap();
        let parsed: BackupManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.cluster, "lab");
        assert!(parsed.complete);
        assert_eq!(parsed.snapshots.len(), 1);
    }
}
