//! kubectl CLI wrapper
//!
//! Wraps kubectl invocations behind typed methods. Mutating calls and
//! read-only probes both run with a per-call timeout; callers never
//! assemble command strings themselves.

use crate::error::{KubeError, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// kubectl CLI wrapper
pub struct KubeClient {
    kubeconfig: Option<PathBuf>,
    timeout: Duration,
}

impl KubeClient {
    pub fn new(kubeconfig: Option<PathBuf>) -> Self {
        Self {
            kubeconfig,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run a kubectl command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        self.run_with_stdin(args, None).await
    }

    /// Run a kubectl command, optionally feeding `input` to stdin
    async fn run_with_stdin(&self, args: &[&str], input: Option<&str>) -> Result<String> {
        let mut cmd = Command::new("kubectl");
        if let Some(kubeconfig) = &self.kubeconfig {
            cmd.arg("--kubeconfig").arg(kubeconfig);
        }
        cmd.args(args);
        cmd.stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: kubectl {}", args.join(" "));

        let run = async {
            let mut child = cmd.spawn().map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    KubeError::KubectlNotFound
                } else {
                    KubeError::Io(e)
                }
            })?;

            if let Some(input) = input {
                if let Some(mut stdin) = child.stdin.take() {
                    stdin.write_all(input.as_bytes()).await?;
                }
            }

            let output = child.wait_with_output().await?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(KubeError::CommandFailed(stderr.trim().to_string()));
            }

            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(KubeError::Timeout(self.timeout.as_secs())),
        }
    }

    /// Like `run_command`, mapping a NotFound failure to `Ok(None)`
    async fn run_optional(&self, args: &[&str]) -> Result<Option<String>> {
        match self.run_command(args).await {
            Ok(output) => Ok(Some(output)),
            Err(KubeError::CommandFailed(stderr)) if stderr.contains("NotFound") => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether the API server answers its readiness endpoint
    pub async fn api_ready(&self) -> Result<bool> {
        match self.run_command(&["get", "--raw", "/readyz"]).await {
            Ok(body) => Ok(body.trim() == "ok"),
            Err(KubeError::KubectlNotFound) => Err(KubeError::KubectlNotFound),
            Err(_) => Ok(false),
        }
    }

    /// List cluster nodes with their readiness
    pub async fn get_nodes(&self) -> Result<Vec<NodeInfo>> {
        let output = self.run_command(&["get", "nodes", "-o", "json"]).await?;
        parse_nodes(&output)
    }

    /// Current state of a namespace, `None` if it does not exist
    pub async fn namespace_state(&self, name: &str) -> Result<Option<NamespaceState>> {
        let output = self
            .run_optional(&["get", "namespace", name, "-o", "json"])
            .await?;

        match output {
            Some(json) => parse_namespace_state(&json).map(Some),
            None => Ok(None),
        }
    }

    /// Rollout status of a deployment, `None` if it does not exist
    pub async fn deployment_status(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<WorkloadStatus>> {
        let output = self
            .run_optional(&["-n", namespace, "get", "deployment", name, "-o", "json"])
            .await?;

        match output {
            Some(json) => parse_deployment_status(&json).map(Some),
            None => Ok(None),
        }
    }

    /// Scheduling status of a daemonset, `None` if it does not exist
    pub async fn daemonset_status(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<WorkloadStatus>> {
        let output = self
            .run_optional(&["-n", namespace, "get", "daemonset", name, "-o", "json"])
            .await?;

        match output {
            Some(json) => parse_daemonset_status(&json).map(Some),
            None => Ok(None),
        }
    }

    /// Pods not in a Running/Succeeded state, cluster-wide
    pub async fn unhealthy_pods(&self) -> Result<Vec<PodInfo>> {
        let output = self
            .run_command(&["get", "pods", "--all-namespaces", "-o", "json"])
            .await?;
        let pods = parse_pods(&output)?;
        Ok(pods
            .into_iter()
            .filter(|p| p.phase != "Running" && p.phase != "Succeeded")
            .collect())
    }

    /// Whether any storage class exists
    pub async fn has_storage_class(&self) -> Result<bool> {
        let output = self
            .run_command(&["get", "storageclass", "-o", "json"])
            .await?;
        let list: ItemCount = serde_json::from_str(&output)?;
        Ok(!list.items.is_empty())
    }

    /// Export every resource of `kind` as a single YAML document.
    /// Cluster-scoped kinds ignore the namespace dimension.
    pub async fn export_yaml(&self, kind: &str, all_namespaces: bool) -> Result<String> {
        let mut args = vec!["get", kind, "-o", "yaml"];
        if all_namespaces {
            args.push("--all-namespaces");
        }
        self.run_command(&args).await
    }

    /// Whether applying a kustomize directory would change anything.
    ///
    /// `kubectl diff` exits 0 when live state matches, 1 when
    /// differences are pending; both are answers, not errors.
    pub async fn diff_kustomize_clean(&self, dir: &str) -> Result<bool> {
        let mut cmd = Command::new("kubectl");
        if let Some(kubeconfig) = &self.kubeconfig {
            cmd.arg("--kubeconfig").arg(kubeconfig);
        }
        cmd.args(["diff", "-k", dir]);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: kubectl diff -k {}", dir);

        let run = async {
            let output = cmd.output().await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    KubeError::KubectlNotFound
                } else {
                    KubeError::Io(e)
                }
            })?;

            match output.status.code() {
                Some(0) => Ok(true),
                Some(1) => Ok(false),
                _ => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(KubeError::CommandFailed(stderr.trim().to_string()))
                }
            }
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(KubeError::Timeout(self.timeout.as_secs())),
        }
    }

    /// Apply a kustomize directory
    pub async fn apply_kustomize(&self, dir: &str) -> Result<()> {
        self.run_command(&["apply", "-k", dir]).await?;
        Ok(())
    }

    /// Delete everything a kustomize directory created
    pub async fn delete_kustomize(&self, dir: &str) -> Result<()> {
        self.run_command(&["delete", "-k", dir, "--ignore-not-found=true", "--wait=false"])
            .await?;
        Ok(())
    }

    /// Issue a namespace deletion without waiting for completion
    pub async fn delete_namespace(&self, name: &str) -> Result<()> {
        self.run_command(&[
            "delete",
            "namespace",
            name,
            "--ignore-not-found=true",
            "--wait=false",
        ])
        .await?;
        Ok(())
    }

    /// Clear the finalizers of a namespace stuck terminating.
    ///
    /// Bypasses the normal graceful-removal protocol; callers must log
    /// this loudly.
    pub async fn force_finalize_namespace(&self, name: &str) -> Result<()> {
        let output = self
            .run_optional(&["get", "namespace", name, "-o", "json"])
            .await?;

        let Some(json) = output else {
            return Ok(()); // already gone
        };

        let mut ns: serde_json::Value = serde_json::from_str(&json)?;
        if let Some(spec) = ns.get_mut("spec") {
            spec["finalizers"] = serde_json::json!([]);
        }

        let path = format!("/api/v1/namespaces/{}/finalize", name);
        self.run_with_stdin(&["replace", "--raw", &path, "-f", "-"], Some(&ns.to_string()))
            .await?;
        Ok(())
    }
}

/// Node name plus readiness, distilled from `kubectl get nodes -o json`
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub name: String,
    pub ready: bool,
    pub kubelet_version: String,
}

/// Replica readiness of a deployment or daemonset
#[derive(Debug, Clone, Copy)]
pub struct WorkloadStatus {
    pub desired: u32,
    pub ready: u32,
}

impl WorkloadStatus {
    pub fn fully_ready(&self) -> bool {
        self.desired > 0 && self.ready >= self.desired
    }
}

/// Namespace lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceState {
    Active,
    Terminating,
}

/// Pod identity and phase
#[derive(Debug, Clone)]
pub struct PodInfo {
    pub namespace: String,
    pub name: String,
    pub phase: String,
}

#[derive(Deserialize)]
struct ItemCount {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

fn parse_nodes(json: &str) -> Result<Vec<NodeInfo>> {
    #[derive(Deserialize)]
    struct NodeList {
        #[serde(default)]
        items: Vec<NodeItem>,
    }

    #[derive(Deserialize)]
    struct NodeItem {
        metadata: Metadata,
        #[serde(default)]
        status: NodeStatus,
    }

    #[derive(Deserialize)]
    struct Metadata {
        name: String,
    }

    #[derive(Deserialize, Default)]
    struct NodeStatus {
        #[serde(default)]
        conditions: Vec<Condition>,
        #[serde(rename = "nodeInfo")]
        node_info: Option<NodeSystemInfo>,
    }

    #[derive(Deserialize)]
    struct Condition {
        #[serde(rename = "type")]
        kind: String,
        status: String,
    }

    #[derive(Deserialize)]
    struct NodeSystemInfo {
        #[serde(rename = "kubeletVersion")]
        kubelet_version: String,
    }

    let list: NodeList = serde_json::from_str(json)?;
    Ok(list
        .items
        .into_iter()
        .map(|item| {
            let ready = item
                .status
                .conditions
                .iter()
                .any(|c| c.kind == "Ready" && c.status == "True");
            NodeInfo {
                name: item.metadata.name,
                ready,
                kubelet_version: item
                    .status
                    .node_info
                    .map(|i| i.kubelet_version)
                    .unwrap_or_default(),
            }
        })
        .collect())
}

fn parse_namespace_state(json: &str) -> Result<NamespaceState> {
    #[derive(Deserialize)]
    struct Namespace {
        #[serde(default)]
        status: NamespaceStatus,
    }

    #[derive(Deserialize, Default)]
    struct NamespaceStatus {
        phase: Option<String>,
    }

    let ns: Namespace = serde_json::from_str(json)?;
    match ns.status.phase.as_deref() {
        Some("Terminating") => Ok(NamespaceState::Terminating),
        Some("Active") | None => Ok(NamespaceState::Active),
        Some(other) => Err(KubeError::UnexpectedOutput(format!(
            "namespace phase '{}'",
            other
        ))),
    }
}

fn parse_deployment_status(json: &str) -> Result<WorkloadStatus> {
    #[derive(Deserialize)]
    struct Deployment {
        #[serde(default)]
        spec: DeploymentSpec,
        #[serde(default)]
        status: DeploymentStatus,
    }

    #[derive(Deserialize, Default)]
    struct DeploymentSpec {
        replicas: Option<u32>,
    }

    #[derive(Deserialize, Default)]
    struct DeploymentStatus {
        #[serde(rename = "readyReplicas")]
        ready_replicas: Option<u32>,
    }

    let deployment: Deployment = serde_json::from_str(json)?;
    Ok(WorkloadStatus {
        desired: deployment.spec.replicas.unwrap_or(1),
        ready: deployment.status.ready_replicas.unwrap_or(0),
    })
}

fn parse_daemonset_status(json: &str) -> Result<WorkloadStatus> {
    #[derive(Deserialize)]
    struct DaemonSet {
        #[serde(default)]
        status: DaemonSetStatus,
    }

    #[derive(Deserialize, Default)]
    struct DaemonSetStatus {
        #[serde(rename = "desiredNumberScheduled")]
        desired: Option<u32>,
        #[serde(rename = "numberReady")]
        ready: Option<u32>,
    }

    let ds: DaemonSet = serde_json::from_str(json)?;
    Ok(WorkloadStatus {
        desired: ds.status.desired.unwrap_or(0),
        ready: ds.status.ready.unwrap_or(0),
    })
}

fn parse_pods(json: &str) -> Result<Vec<PodInfo>> {
    #[derive(Deserialize)]
    struct PodList {
        #[serde(default)]
        items: Vec<PodItem>,
    }

    #[derive(Deserialize)]
    struct PodItem {
        metadata: PodMetadata,
        #[serde(default)]
        status: PodStatus,
    }

    #[derive(Deserialize)]
    struct PodMetadata {
        name: String,
        #[serde(default)]
        namespace: String,
    }

    #[derive(Deserialize, Default)]
    struct PodStatus {
        phase: Option<String>,
    }

    let list: PodList = serde_json::from_str(json)?;
    Ok(list
        .items
        .into_iter()
        .map(|item| PodInfo {
            namespace: item.metadata.namespace,
            name: item.metadata.name,
            phase: item.status.phase.unwrap_or_else(|| "Unknown".to_string()),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nodes() {
        let json = r#"{
            "items": [
                {
                    "metadata": {"name": "cp-1"},
                    "status": {
                        "conditions": [
                            {"type": "MemoryPressure", "status": "False"},
                            {"type": "Ready", "status": "True"}
                        ],
                        "nodeInfo": {"kubeletVersion": "v1.31.4"}
                    }
                },
                {
                    "metadata": {"name": "worker-1"},
                    "status": {
                        "conditions": [{"type": "Ready", "status": "False"}],
                        "nodeInfo": {"kubeletVersion": "v1.31.4"}
                    }
                }
            ]
        }"#;

        let nodes = parse_nodes(json).unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].ready);
        assert_eq!(nodes[0].kubelet_version, "v1.31.4");
        assert!(!nodes[1].ready);
    }

    #[test]
    fn test_parse_empty_node_list() {
        let nodes = parse_nodes(r#"{"items": []}"#).unwrap();
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_parse_namespace_terminating() {
        let json = r#"{"status": {"phase": "Terminating"}}"#;
        assert_eq!(
            parse_namespace_state(json).unwrap(),
            NamespaceState::Terminating
        );
    }

    #[test]
    fn test_parse_deployment_status() {
        let json = r#"{
            "spec": {"replicas": 3},
            "status": {"readyReplicas": 2}
        }"#;

        let status = parse_deployment_status(json).unwrap();
        assert_eq!(status.desired, 3);
        assert_eq!(status.ready, 2);
        assert!(!status.fully_ready());
    }

    #[test]
    fn test_deployment_without_status_defaults_to_zero_ready() {
        let status = parse_deployment_status(r#"{"spec": {"replicas": 1}}"#).unwrap();
        assert_eq!(status.ready, 0);
        assert!(!status.fully_ready());
    }

    #[test]
    fn test_parse_daemonset_status() {
        let json = r#"{
            "status": {"desiredNumberScheduled": 4, "numberReady": 4}
        }"#;

        let status = parse_daemonset_status(json).unwrap();
        assert!(status.fully_ready());
    }

    #[test]
    fn test_parse_pods_filters_nothing() {
        let json = r#"{
            "items": [
                {"metadata": {"name": "a", "namespace": "default"}, "status": {"phase": "Running"}},
                {"metadata": {"name": "b", "namespace": "kube-system"}, "status": {"phase": "Pending"}},
                {"metadata": {"name": "c", "namespace": "default"}, "status": {}}
            ]
        }"#;

        let pods = parse_pods(json).unwrap();
        assert_eq!(pods.len(), 3);
        assert_eq!(pods[1].phase, "Pending");
        assert_eq!(pods[2].phase, "Unknown");
    }
}
