//! アドオンフェーズ
//!
//! Helm チャート1つにつき1フェーズ。インストールは `upgrade --install`
//! なので再実行で収束します。除去はリリースのアンインストールに加え、
//! 専有 namespace の削除まで面倒を見ます。Terminating で固着した
//! namespace は executor の forced-cleanup 経路から finalizer を
//! 剥がします。

use async_trait::async_trait;
use clusterflow_config::Addon;
use clusterflow_core::{
    ExecutionContext, PhaseError, PhaseHandler, ProbeError, ProbeResult, ResourceState,
};
use clusterflow_helm::HelmClient;
use clusterflow_kube::{KubeClient, NamespaceState};
use clusterflow_verify::release_name;
use std::sync::Arc;

/// 共有 namespace はアドオン除去で消してはならない
const SHARED_NAMESPACES: &[&str] = &["kube-system", "default"];

pub struct AddonPhase {
    helm: Arc<HelmClient>,
    kube: Arc<KubeClient>,
    name: String,
    addon: Addon,
}

impl AddonPhase {
    pub fn new(helm: Arc<HelmClient>, kube: Arc<KubeClient>, name: &str, addon: Addon) -> Self {
        Self {
            helm,
            kube,
            name: name.to_string(),
            addon,
        }
    }

    fn release(&self) -> &str {
        release_name(&self.addon.chart)
    }

    fn owns_namespace(&self) -> bool {
        !SHARED_NAMESPACES.contains(&self.addon.namespace.as_str())
    }
}

#[async_trait]
impl PhaseHandler for AddonPhase {
    async fn probe(&self, _ctx: &ExecutionContext) -> Result<ProbeResult, ProbeError> {
        let release = self
            .helm
            .release(&self.addon.namespace, self.release())
            .await
            .map_err(|e| ProbeError::new(&self.name, e.to_string()))?;

        match release {
            Some(r) if r.is_deployed() => {
                Ok(ProbeResult::new(&self.name, ResourceState::Ready).with_detail(r.chart))
            }
            Some(r) => Ok(ProbeResult::new(&self.name, ResourceState::Degraded)
                .with_detail(format!("release status: {}", r.status))),
            None => {
                // リリースなし。専有 namespace が Terminating のまま
                // 残っていれば除去待ちの状態として報告する
                if self.owns_namespace() {
                    let state = self
                        .kube
                        .namespace_state(&self.addon.namespace)
                        .await
                        .map_err(|e| ProbeError::new(&self.name, e.to_string()))?;
                    if state == Some(NamespaceState::Terminating) {
                        return Ok(ProbeResult::new(&self.name, ResourceState::Terminating)
                            .with_detail(format!("namespace {} terminating", self.addon.namespace)));
                    }
                }
                Ok(ProbeResult::new(&self.name, ResourceState::Absent))
            }
        }
    }

    async fn apply(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
        if let Some(repo) = &self.addon.repo {
            let alias = self
                .addon
                .chart
                .split('/')
                .next()
                .unwrap_or_else(|| self.release());
            self.helm
                .repo_add(alias, repo)
                .await
                .map_err(|e| PhaseError::new(e.to_string()))?;
        }

        self.helm
            .upgrade_install(
                self.release(),
                &self.addon.chart,
                &self.addon.namespace,
                self.addon.version.as_deref(),
                self.addon.values.as_deref(),
            )
            .await
            .map_err(|e| PhaseError::new(e.to_string()))
    }

    async fn remove(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
        self.helm
            .uninstall(self.release(), &self.addon.namespace)
            .await
            .map_err(|e| PhaseError::new(e.to_string()))?;

        if self.owns_namespace() {
            self.kube
                .delete_namespace(&self.addon.namespace)
                .await
                .map_err(|e| PhaseError::new(e.to_string()))?;
        }

        Ok(())
    }

    async fn force_remove(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
        if self.owns_namespace() {
            tracing::warn!(
                namespace = %self.addon.namespace,
                "Clearing finalizers of stuck namespace"
            );
            self.kube
                .force_finalize_namespace(&self.addon.namespace)
                .await
                .map_err(|e| PhaseError::new(e.to_string()))?;
        }
        Ok(())
    }
}
