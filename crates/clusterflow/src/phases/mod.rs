//! ワークフロー別フェーズリストの組み立て
//!
//! トポロジー設定と外部コラボレーター (kubectl / helm / tofu / ssh) から
//! 各ワークフローのフェーズ列を構築します。リストは実行前に確定し、
//! 実行中に増減しません。teardown 用のリストは同じ構成要素から
//! 除去方向のタグ (destructive / data-destructive) を付けて別途
//! 組み立てます。

pub mod addons;
pub mod apps;
pub mod infra;
pub mod nodes;

use addons::AddonPhase;
use apps::AppsPhase;
use clusterflow_config::{ClusterConfig, Node};
use clusterflow_core::Phase;
use clusterflow_helm::HelmClient;
use clusterflow_infra::{RemoteShell, TofuClient};
use clusterflow_kube::KubeClient;
use infra::InfraPhase;
use nodes::{ControlPlanePhase, NodeJoinPhase, NodePreparePhase, NodesReadyPhase};
use std::sync::Arc;

/// アドオンの導入順序 (依存の浅いものから深いものへ)
const ADDON_ORDER: &[&str] = &[
    "networking",
    "storage",
    "ingress",
    "observability",
    "secrets",
    "ci-tooling",
];

/// 外部コラボレーターの束
pub struct Collaborators {
    pub kube: Arc<KubeClient>,
    pub helm: Arc<HelmClient>,
    pub shell: Arc<RemoteShell>,
}

impl Collaborators {
    pub fn new(config: &ClusterConfig) -> Self {
        Self {
            kube: Arc::new(KubeClient::new(config.kubeconfig.clone())),
            helm: Arc::new(HelmClient::new(config.kubeconfig.clone())),
            shell: Arc::new(RemoteShell::new()),
        }
    }
}

/// rebuild ワークフローのフラグ
#[derive(Debug, Clone, Default)]
pub struct RebuildFlags {
    pub init_control_plane: bool,
    pub skip_init: bool,
    pub skip_observability: bool,
    pub skip_apps: bool,
}

/// rebuild のフェーズ列 (実行順)
pub fn rebuild_phases(
    config: &ClusterConfig,
    collab: &Collaborators,
    flags: &RebuildFlags,
) -> Vec<Phase> {
    let mut phases = Vec::new();

    if let Some(infra_config) = &config.infra {
        let tofu = Arc::new(TofuClient::new(infra_config.dir.clone()));
        phases.push(Phase::new(
            "infrastructure",
            "apply declared infrastructure",
            Arc::new(InfraPhase::new(tofu)),
        ));
    }

    if !flags.skip_init {
        if let Some(cp) = config.control_plane() {
            let mut phase = Phase::new(
                "control-plane",
                "initialize the control plane with kubeadm",
                Arc::new(ControlPlanePhase::new(
                    collab.kube.clone(),
                    collab.shell.clone(),
                    cp.clone(),
                    config.pod_network_cidr.clone(),
                )),
            );
            if flags.init_control_plane {
                // 明示的な再初期化は既存クラスタの状態を壊すので
                // probe スキップを外し、確認ゲートを通す
                phase = phase.always_run().destructive();
            }
            phases.push(phase);

            let joiners: Vec<Node> = config.joining_nodes().into_iter().cloned().collect();
            if !joiners.is_empty() {
                phases.push(Phase::new(
                    "node-join",
                    "join the remaining nodes",
                    Arc::new(NodeJoinPhase::new(
                        collab.kube.clone(),
                        collab.shell.clone(),
                        cp.clone(),
                        joiners,
                    )),
                ));
            }
        }
    }

    phases.push(Phase::new(
        "nodes-ready",
        "wait for every node to become Ready",
        Arc::new(NodesReadyPhase::new(
            collab.kube.clone(),
            config.nodes.len(),
        )),
    ));

    for name in ADDON_ORDER {
        if *name == "observability" && flags.skip_observability {
            continue;
        }
        let Some(addon) = config.addon(name) else {
            continue;
        };

        let phase = Phase::new(
            *name,
            format!("install {} ({})", name, addon.chart),
            Arc::new(AddonPhase::new(
                collab.helm.clone(),
                collab.kube.clone(),
                name,
                addon.clone(),
            )),
        );

        // CNI なしのクラスタは機能しないので networking のみ fatal
        let phase = if *name == "networking" {
            phase
        } else {
            phase.warn_on_failure()
        };
        phases.push(phase);
    }

    if !flags.skip_apps {
        if let Some(apps) = &config.apps {
            phases.push(
                Phase::new(
                    "apps",
                    "apply application manifests",
                    Arc::new(AppsPhase::new(
                        collab.kube.clone(),
                        apps.manifests.clone(),
                    )),
                )
                .warn_on_failure(),
            );
        }
    }

    phases
}

/// teardown のフェーズ列 (プロビジョニング順で返し、executor が逆順に実行)
pub fn teardown_phases(
    config: &ClusterConfig,
    collab: &Collaborators,
    full_reset: bool,
) -> Vec<Phase> {
    let mut phases = Vec::new();

    if full_reset {
        if let Some(infra_config) = &config.infra {
            let tofu = Arc::new(TofuClient::new(infra_config.dir.clone()));
            phases.push(
                Phase::new(
                    "infrastructure",
                    "destroy declared infrastructure",
                    Arc::new(InfraPhase::new(tofu)),
                )
                .data_destructive(),
            );
        }
    }

    if let Some(cp) = config.control_plane() {
        phases.push(
            Phase::new(
                "control-plane",
                "reset the control plane node",
                Arc::new(ControlPlanePhase::new(
                    collab.kube.clone(),
                    collab.shell.clone(),
                    cp.clone(),
                    config.pod_network_cidr.clone(),
                )),
            )
            .destructive()
            .warn_on_failure(),
        );

        let joiners: Vec<Node> = config.joining_nodes().into_iter().cloned().collect();
        if !joiners.is_empty() {
            phases.push(
                Phase::new(
                    "node-join",
                    "reset the joined nodes",
                    Arc::new(NodeJoinPhase::new(
                        collab.kube.clone(),
                        collab.shell.clone(),
                        cp.clone(),
                        joiners,
                    )),
                )
                .destructive()
                .warn_on_failure(),
            );
        }
    }

    for name in ADDON_ORDER {
        let Some(addon) = config.addon(name) else {
            continue;
        };

        let phase = Phase::new(
            *name,
            format!("uninstall {} ({})", name, addon.chart),
            Arc::new(AddonPhase::new(
                collab.helm.clone(),
                collab.kube.clone(),
                name,
                addon.clone(),
            )),
        )
        .warn_on_failure();

        // ストレージ層の除去は永続データを destroy する
        let phase = if *name == "storage" {
            phase.data_destructive()
        } else {
            phase.destructive()
        };
        phases.push(phase);
    }

    if let Some(apps) = &config.apps {
        phases.push(
            Phase::new(
                "apps",
                "delete application manifests",
                Arc::new(AppsPhase::new(
                    collab.kube.clone(),
                    apps.manifests.clone(),
                )),
            )
            .destructive()
            .warn_on_failure(),
        );
    }

    phases
}

/// node-prepare のフェーズ列 (1ノード1フェーズ)
///
/// 1台の失敗で残りのノード準備を止めないため warn 扱い。
pub fn node_prepare_phases(
    config: &ClusterConfig,
    collab: &Collaborators,
    target_version: &str,
) -> Vec<Phase> {
    config
        .nodes
        .iter()
        .map(|node| {
            Phase::new(
                format!("prepare-{}", node.name),
                format!("prepare {} for kubernetes {}", node.name, target_version),
                Arc::new(NodePreparePhase::new(
                    collab.shell.clone(),
                    node.clone(),
                    target_version,
                )),
            )
            .warn_on_failure()
        })
        .collect()
}
