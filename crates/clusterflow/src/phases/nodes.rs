//! ノード系フェーズ
//!
//! コントロールプレーン初期化、ワーカー参加、Ready 待機、ノード準備。
//! リモート操作はすべて ssh チャンネル経由です。

use async_trait::async_trait;
use clusterflow_config::Node;
use clusterflow_core::{
    poll_until, ExecutionContext, PhaseError, PhaseHandler, PollConfig, PollOutcome, ProbeError,
    ProbeResult, ResourceState,
};
use clusterflow_infra::RemoteShell;
use clusterflow_kube::KubeClient;
use std::sync::Arc;
use std::time::Duration;

/// kubeadm init によるコントロールプレーン構築
pub struct ControlPlanePhase {
    kube: Arc<KubeClient>,
    shell: Arc<RemoteShell>,
    node: Node,
    pod_network_cidr: Option<String>,
}

impl ControlPlanePhase {
    pub fn new(
        kube: Arc<KubeClient>,
        shell: Arc<RemoteShell>,
        node: Node,
        pod_network_cidr: Option<String>,
    ) -> Self {
        Self {
            kube,
            shell,
            node,
            pod_network_cidr,
        }
    }
}

#[async_trait]
impl PhaseHandler for ControlPlanePhase {
    async fn probe(&self, _ctx: &ExecutionContext) -> Result<ProbeResult, ProbeError> {
        match self.kube.api_ready().await {
            Ok(true) => Ok(ProbeResult::new("control-plane", ResourceState::Ready)
                .with_detail("api server answering")),
            Ok(false) => Ok(ProbeResult::new("control-plane", ResourceState::Absent)),
            Err(e) => Err(ProbeError::new("control-plane", e.to_string())),
        }
    }

    async fn apply(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
        let mut command = "sudo kubeadm init".to_string();
        if let Some(cidr) = &self.pod_network_cidr {
            command.push_str(&format!(" --pod-network-cidr={}", cidr));
        }

        self.shell
            .run(&self.node.ssh_target(), self.node.port, &command)
            .await
            .map_err(|e| PhaseError::new(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
        self.shell
            .run(
                &self.node.ssh_target(),
                self.node.port,
                "sudo kubeadm reset -f",
            )
            .await
            .map_err(|e| PhaseError::new(e.to_string()))?;
        Ok(())
    }
}

/// 残りのノードをクラスタへ参加させる
pub struct NodeJoinPhase {
    kube: Arc<KubeClient>,
    shell: Arc<RemoteShell>,
    control_plane: Node,
    nodes: Vec<Node>,
}

impl NodeJoinPhase {
    pub fn new(
        kube: Arc<KubeClient>,
        shell: Arc<RemoteShell>,
        control_plane: Node,
        nodes: Vec<Node>,
    ) -> Self {
        Self {
            kube,
            shell,
            control_plane,
            nodes,
        }
    }

    async fn registered_names(&self) -> Result<Vec<String>, ProbeError> {
        let nodes = self
            .kube
            .get_nodes()
            .await
            .map_err(|e| ProbeError::new("node-join", e.to_string()))?;
        Ok(nodes.into_iter().map(|n| n.name).collect())
    }
}

#[async_trait]
impl PhaseHandler for NodeJoinPhase {
    async fn probe(&self, _ctx: &ExecutionContext) -> Result<ProbeResult, ProbeError> {
        let registered = self.registered_names().await?;
        let missing: Vec<_> = self
            .nodes
            .iter()
            .filter(|n| !registered.contains(&n.name))
            .map(|n| n.name.as_str())
            .collect();

        if missing.is_empty() {
            Ok(ProbeResult::new("node-join", ResourceState::Ready)
                .with_detail(format!("{} nodes registered", self.nodes.len())))
        } else {
            Ok(ProbeResult::new("node-join", ResourceState::Absent)
                .with_detail(format!("missing: {}", missing.join(", "))))
        }
    }

    async fn apply(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
        // 参加済みノードはスキップして残りだけ join する
        let registered = self.registered_names().await.unwrap_or_default();

        for node in &self.nodes {
            if registered.contains(&node.name) {
                tracing::debug!(node = %node.name, "Already joined, skipping");
                continue;
            }

            let join_command = self
                .shell
                .run(
                    &self.control_plane.ssh_target(),
                    self.control_plane.port,
                    "sudo kubeadm token create --print-join-command",
                )
                .await
                .map_err(|e| PhaseError::new(e.to_string()))?;

            tracing::info!(node = %node.name, "Joining node");
            self.shell
                .run(
                    &node.ssh_target(),
                    node.port,
                    &format!("sudo {}", join_command.trim()),
                )
                .await
                .map_err(|e| PhaseError::new(format!("join of {} failed: {}", node.name, e)))?;
        }

        Ok(())
    }

    async fn remove(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
        let mut failures = Vec::new();

        for node in &self.nodes {
            if let Err(e) = self
                .shell
                .run(&node.ssh_target(), node.port, "sudo kubeadm reset -f")
                .await
            {
                failures.push(format!("{}: {}", node.name, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PhaseError::new(failures.join("; ")))
        }
    }
}

/// 全ノードが Ready になるまでの待機フェーズ
///
/// プロビジョニングの後続フェーズが全ノードを前提にするため、
/// このフェーズの失敗は fatal 扱いにします。
pub struct NodesReadyPhase {
    kube: Arc<KubeClient>,
    expected: usize,
}

impl NodesReadyPhase {
    pub fn new(kube: Arc<KubeClient>, expected: usize) -> Self {
        Self { kube, expected }
    }

    async fn ready_count(&self) -> Option<(usize, usize)> {
        match self.kube.get_nodes().await {
            Ok(nodes) => {
                let ready = nodes.iter().filter(|n| n.ready).count();
                Some((ready, nodes.len()))
            }
            Err(_) => None,
        }
    }
}

#[async_trait]
impl PhaseHandler for NodesReadyPhase {
    async fn probe(&self, _ctx: &ExecutionContext) -> Result<ProbeResult, ProbeError> {
        match self.kube.get_nodes().await {
            Ok(nodes) => {
                let ready = nodes.iter().filter(|n| n.ready).count();
                if ready >= self.expected {
                    Ok(ProbeResult::new("nodes-ready", ResourceState::Ready)
                        .with_detail(format!("{}/{} ready", ready, self.expected)))
                } else {
                    Ok(ProbeResult::new("nodes-ready", ResourceState::Absent)
                        .with_detail(format!("{}/{} ready", ready, self.expected)))
                }
            }
            Err(e) => Err(ProbeError::new("nodes-ready", e.to_string())),
        }
    }

    async fn apply(&self, ctx: &ExecutionContext) -> Result<(), PhaseError> {
        let config = PollConfig::new(Duration::from_secs(10), Duration::from_secs(600));
        let cancel = ctx.cancel_flag();

        let outcome = poll_until(&config, "nodes-ready", &cancel, || async {
            matches!(self.ready_count().await, Some((ready, _)) if ready >= self.expected)
        })
        .await;

        match outcome {
            PollOutcome::Satisfied => Ok(()),
            PollOutcome::TimedOut => Err(PhaseError::new(format!(
                "not all {} nodes became Ready within 600s",
                self.expected
            ))),
            PollOutcome::Cancelled => Err(PhaseError::new("wait cancelled")),
        }
    }

    async fn remove(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
        // 待機のみのフェーズに除去対象はない
        Ok(())
    }
}

/// ノード準備フェーズ (node-prepare ワークフロー、1ノード1フェーズ)
pub struct NodePreparePhase {
    shell: Arc<RemoteShell>,
    node: Node,
    target_version: String,
}

impl NodePreparePhase {
    pub fn new(shell: Arc<RemoteShell>, node: Node, target_version: impl Into<String>) -> Self {
        Self {
            shell,
            node,
            target_version: target_version.into(),
        }
    }

    fn wanted(&self) -> &str {
        self.target_version.trim_start_matches('v')
    }
}

#[async_trait]
impl PhaseHandler for NodePreparePhase {
    async fn probe(&self, _ctx: &ExecutionContext) -> Result<ProbeResult, ProbeError> {
        let output = self
            .shell
            .run_optional(
                &self.node.ssh_target(),
                self.node.port,
                "kubeadm version -o short",
            )
            .await
            .map_err(|e| ProbeError::new(&self.node.name, e.to_string()))?;

        match output {
            Some(version) => {
                let installed = version.trim().trim_start_matches('v').to_string();
                if installed == self.wanted() {
                    Ok(ProbeResult::new(&self.node.name, ResourceState::Ready)
                        .with_detail(format!("kubeadm {}", installed)))
                } else {
                    Ok(ProbeResult::new(&self.node.name, ResourceState::Absent)
                        .with_detail(format!("kubeadm {} installed", installed)))
                }
            }
            None => Ok(ProbeResult::new(&self.node.name, ResourceState::Absent)
                .with_detail("kubeadm not installed")),
        }
    }

    async fn apply(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
        let version = self.wanted();
        let steps = [
            "sudo swapoff -a && sudo sed -i '/ swap / s/^/#/' /etc/fstab".to_string(),
            "sudo modprobe overlay && sudo modprobe br_netfilter".to_string(),
            "printf 'net.bridge.bridge-nf-call-iptables=1\\nnet.ipv4.ip_forward=1\\n' \
             | sudo tee /etc/sysctl.d/99-kubernetes.conf && sudo sysctl --system"
                .to_string(),
            "sudo apt-get update -q && sudo apt-get install -y containerd".to_string(),
            format!(
                "sudo apt-get install -y --allow-downgrades \
                 kubeadm={v}-* kubelet={v}-* kubectl={v}-*",
                v = version
            ),
            "sudo systemctl enable --now containerd kubelet".to_string(),
        ];

        for step in &steps {
            tracing::info!(node = %self.node.name, step, "Preparing node");
            self.shell
                .run(&self.node.ssh_target(), self.node.port, step)
                .await
                .map_err(|e| PhaseError::new(e.to_string()))?;
        }

        Ok(())
    }

    async fn remove(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
        // 準備フェーズに除去はない (node-prepare は前進のみ)
        Ok(())
    }
}
