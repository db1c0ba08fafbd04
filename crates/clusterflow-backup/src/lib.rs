//! ClusterFlow backup engine
//!
//! Exports named resource collections from the cluster, one file per
//! collection, isolating failures so one broken export never prevents
//! the remaining collections from being attempted. Every run ends with
//! a manifest; partial backups are valid outputs and the caller decides
//! whether partial is acceptable.

pub mod error;
pub mod manifest;

pub use error::{BackupError, Result};
pub use manifest::{BackupManifest, Snapshot};

use async_trait::async_trait;
use chrono::Utc;
use colored::Colorize;
use clusterflow_kube::KubeClient;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::path::{Path, PathBuf};

/// A named resource collection to export
#[derive(Debug, Clone)]
pub struct Collection {
    /// Collection name, also the export file stem
    pub name: &'static str,

    /// kubectl resource kind
    pub kind: &'static str,

    /// Whether the kind is namespaced (exported across all namespaces)
    pub namespaced: bool,

    /// Secret material; only exported with include-sensitive
    pub sensitive: bool,

    /// Application-level resource (in scope for the "apps" scope)
    pub app_level: bool,
}

const COLLECTIONS: &[Collection] = &[
    Collection { name: "namespaces", kind: "namespaces", namespaced: false, sensitive: false, app_level: false },
    Collection { name: "nodes", kind: "nodes", namespaced: false, sensitive: false, app_level: false },
    Collection { name: "storageclasses", kind: "storageclasses", namespaced: false, sensitive: false, app_level: false },
    Collection { name: "crds", kind: "crds", namespaced: false, sensitive: false, app_level: false },
    Collection { name: "deployments", kind: "deployments", namespaced: true, sensitive: false, app_level: true },
    Collection { name: "statefulsets", kind: "statefulsets", namespaced: true, sensitive: false, app_level: true },
    Collection { name: "daemonsets", kind: "daemonsets", namespaced: true, sensitive: false, app_level: true },
    Collection { name: "services", kind: "services", namespaced: true, sensitive: false, app_level: true },
    Collection { name: "ingresses", kind: "ingresses", namespaced: true, sensitive: false, app_level: true },
    Collection { name: "configmaps", kind: "configmaps", namespaced: true, sensitive: false, app_level: true },
    Collection { name: "persistentvolumeclaims", kind: "persistentvolumeclaims", namespaced: true, sensitive: false, app_level: true },
    Collection { name: "secrets", kind: "secrets", namespaced: true, sensitive: true, app_level: true },
];

/// Backup scope selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupScope {
    /// Everything
    All,
    /// Cluster-scoped resources only
    Cluster,
    /// Application-level resources only
    Apps,
}

impl BackupScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupScope::All => "all",
            BackupScope::Cluster => "cluster",
            BackupScope::Apps => "apps",
        }
    }
}

/// Collections selected by scope and sensitivity
pub fn collections_for(scope: BackupScope, include_sensitive: bool) -> Vec<&'static Collection> {
    COLLECTIONS
        .iter()
        .filter(|c| match scope {
            BackupScope::All => true,
            BackupScope::Cluster => !c.namespaced,
            BackupScope::Apps => c.app_level,
        })
        .filter(|c| include_sensitive || !c.sensitive)
        .collect()
}

/// Source of collection exports.
///
/// A seam so the engine's isolation behavior is testable without a
/// cluster; the real implementation shells out through [`KubeClient`].
#[async_trait]
pub trait CollectionExporter: Send + Sync {
    /// Export the collection as YAML, or an error detail
    async fn export(&self, collection: &Collection) -> std::result::Result<String, String>;
}

/// Exporter backed by the control plane client
pub struct KubeExporter {
    client: KubeClient,
}

impl KubeExporter {
    pub fn new(client: KubeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CollectionExporter for KubeExporter {
    async fn export(&self, collection: &Collection) -> std::result::Result<String, String> {
        self.client
            .export_yaml(collection.kind, collection.namespaced)
            .await
            .map_err(|e| e.to_string())
    }
}

/// Parameters of a single backup run
#[derive(Debug, Clone)]
pub struct BackupOptions {
    pub cluster: String,
    pub scope: BackupScope,
    pub include_sensitive: bool,
    pub archive: bool,
    pub output_root: PathBuf,
}

/// Outcome of a backup run
#[derive(Debug)]
pub struct BackupOutcome {
    pub dir: PathBuf,
    pub manifest: BackupManifest,
    pub archive_path: Option<PathBuf>,
}

/// The snapshot engine
pub struct BackupEngine {
    exporter: Box<dyn CollectionExporter>,
}

impl BackupEngine {
    pub fn new(exporter: Box<dyn CollectionExporter>) -> Self {
        Self { exporter }
    }

    /// Attempt every selected collection, write the manifest, optionally
    /// archive. Collection failures are captured, never propagated.
    pub async fn run(&self, options: &BackupOptions) -> Result<BackupOutcome> {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let dir = options
            .output_root
            .join(format!("{}-{}", options.cluster, stamp));

        std::fs::create_dir_all(&dir).map_err(|e| {
            BackupError::OutputDir(format!("{}: {}", dir.display(), e))
        })?;

        tracing::info!(dir = %dir.display(), scope = options.scope.as_str(), "Backup starting");

        let mut snapshots = Vec::new();
        for collection in collections_for(options.scope, options.include_sensitive) {
            snapshots.push(self.export_collection(collection, &dir).await);
        }

        let manifest = BackupManifest::new(
            &options.cluster,
            options.scope.as_str(),
            options.include_sensitive,
            snapshots,
        );
        manifest.write(&dir)?;

        let archive_path = if options.archive {
            Some(archive_dir(&dir)?)
        } else {
            None
        };

        tracing::info!(
            succeeded = manifest.succeeded(),
            failed = manifest.failed(),
            total_bytes = manifest.total_size_bytes,
            "Backup finished"
        );

        Ok(BackupOutcome {
            dir,
            manifest,
            archive_path,
        })
    }

    /// Export one collection; failures land on the snapshot entry.
    async fn export_collection(&self, collection: &Collection, dir: &Path) -> Snapshot {
        let file = format!("{}.yaml", collection.name);

        let yaml = match self.exporter.export(collection).await {
            Ok(yaml) => yaml,
            Err(detail) => {
                println!("  {} {} ({})", "✗".red(), collection.name, detail);
                tracing::warn!(collection = collection.name, error = %detail, "Collection export failed");
                return Snapshot::failed(collection.name, &file, detail);
            }
        };

        let items = match count_items(&yaml) {
            Ok(items) => items,
            Err(detail) => {
                println!("  {} {} ({})", "✗".red(), collection.name, detail);
                tracing::warn!(collection = collection.name, error = %detail, "Export unparseable");
                return Snapshot::failed(collection.name, &file, detail);
            }
        };

        let path = dir.join(&file);
        if let Err(e) = std::fs::write(&path, &yaml) {
            println!("  {} {} ({})", "✗".red(), collection.name, e);
            tracing::warn!(collection = collection.name, error = %e, "Export write failed");
            return Snapshot::failed(collection.name, &file, e.to_string());
        }

        let size_bytes = yaml.len() as u64;
        println!(
            "  {} {} ({} items, {} bytes)",
            "✓".green(),
            collection.name,
            items,
            size_bytes
        );
        Snapshot::ok(collection.name, &file, items, size_bytes)
    }
}

/// Count the resources in a `kind: List` YAML export
fn count_items(yaml: &str) -> std::result::Result<u32, String> {
    let doc: serde_yaml::Value = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;
    match doc.get("items") {
        Some(serde_yaml::Value::Sequence(items)) => Ok(items.len() as u32),
        Some(_) => Err("items is not a sequence".to_string()),
        None => Ok(0),
    }
}

/// Pack a backup directory into `<dir>.tar.gz`
fn archive_dir(dir: &Path) -> Result<PathBuf> {
    let archive_path = dir.with_extension("tar.gz");
    let file = std::fs::File::create(&archive_path)
        .map_err(|e| BackupError::Archive(e.to_string()))?;

    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let base = dir
        .file_name()
        .ok_or_else(|| BackupError::Archive("invalid backup directory".to_string()))?;
    builder
        .append_dir_all(base, dir)
        .map_err(|e| BackupError::Archive(e.to_string()))?;
    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(|e| BackupError::Archive(e.to_string()))?;

    tracing::info!(path = %archive_path.display(), "Backup archived");
    Ok(archive_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct FakeExporter {
        fail: &'static [&'static str],
    }

    #[async_trait]
    impl CollectionExporter for FakeExporter {
        async fn export(&self, collection: &Collection) -> std::result::Result<String, String> {
            if self.fail.contains(&collection.name) {
                return Err("connection reset".to_string());
            }
            Ok(format!(
                "apiVersion: v1\nkind: List\nitems:\n- kind: {}\n", // one item
                collection.kind
            ))
        }
    }

    fn options(root: &Path) -> BackupOptions {
        BackupOptions {
            cluster: "lab".to_string(),
            scope: BackupScope::All,
            include_sensitive: false,
            archive: false,
            output_root: root.to_path_buf(),
        }
    }

    #[test]
    fn test_count_items() {
        let yaml = "apiVersion: v1\nkind: List\nitems:\n- a: 1\n- a: 2\n";
        assert_eq!(count_items(yaml).unwrap(), 2);

        let empty = "apiVersion: v1\nkind: List\nitems: []\n";
        assert_eq!(count_items(empty).unwrap(), 0);
    }

    #[test]
    fn test_scope_selection() {
        let cluster = collections_for(BackupScope::Cluster, false);
        assert!(cluster.iter().all(|c| !c.namespaced));

        let apps = collections_for(BackupScope::Apps, false);
        assert!(apps.iter().all(|c| c.app_level));

        // secrets only appear when sensitive material is requested
        assert!(!collections_for(BackupScope::All, false)
            .iter()
            .any(|c| c.sensitive));
        assert!(collections_for(BackupScope::All, true)
            .iter()
            .any(|c| c.name == "secrets"));
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_siblings() {
        let dir = tempdir().unwrap();
        let engine = BackupEngine::new(Box::new(FakeExporter {
            fail: &["deployments"],
        }));

        let outcome = engine.run(&options(dir.path())).await.unwrap();
        let manifest = &outcome.manifest;

        assert!(!manifest.complete);
        assert_eq!(manifest.failed(), 1);

        let failed: Vec<_> = manifest
            .snapshots
            .iter()
            .filter(|s| !s.is_ok())
            .map(|s| s.collection.as_str())
            .collect();
        assert_eq!(failed, vec!["deployments"]);

        // siblings were attempted and written
        assert!(outcome.dir.join("namespaces.yaml").exists());
        assert!(outcome.dir.join("services.yaml").exists());
        assert!(!outcome.dir.join("deployments.yaml").exists());
        assert!(outcome.dir.join("backup-manifest.json").exists());
    }

    #[tokio::test]
    async fn test_clean_backup_is_complete() {
        let dir = tempdir().unwrap();
        let engine = BackupEngine::new(Box::new(FakeExporter { fail: &[] }));

        let outcome = engine.run(&options(dir.path())).await.unwrap();
        assert!(outcome.manifest.complete);
        assert_eq!(outcome.manifest.failed(), 0);
        assert!(outcome.manifest.total_size_bytes > 0);
    }

    #[tokio::test]
    async fn test_archive_produces_tarball() {
        let dir = tempdir().unwrap();
        let engine = BackupEngine::new(Box::new(FakeExporter { fail: &[] }));

        let mut opts = options(dir.path());
        opts.archive = true;

        let outcome = engine.run(&opts).await.unwrap();
        let archive = outcome.archive_path.unwrap();
        assert!(archive.exists());
        assert!(archive.to_string_lossy().ends_with(".tar.gz"));
    }
}
