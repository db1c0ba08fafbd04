//! アプリケーションフェーズ
//!
//! アプリ群は kustomize ディレクトリの apply として扱います。probe は
//! `kubectl diff -k` の終了コードで「適用済みかどうか」を判定します
//! (インフラ層の plan -detailed-exitcode と同じ発想)。

use async_trait::async_trait;
use clusterflow_core::{
    ExecutionContext, PhaseError, PhaseHandler, ProbeError, ProbeResult, ResourceState,
};
use clusterflow_kube::KubeClient;
use std::path::PathBuf;
use std::sync::Arc;

pub struct AppsPhase {
    kube: Arc<KubeClient>,
    manifests: PathBuf,
}

impl AppsPhase {
    pub fn new(kube: Arc<KubeClient>, manifests: PathBuf) -> Self {
        Self { kube, manifests }
    }

    fn dir(&self) -> String {
        self.manifests.display().to_string()
    }
}

#[async_trait]
impl PhaseHandler for AppsPhase {
    async fn probe(&self, _ctx: &ExecutionContext) -> Result<ProbeResult, ProbeError> {
        match self.kube.diff_kustomize_clean(&self.dir()).await {
            Ok(true) => Ok(ProbeResult::new("apps", ResourceState::Ready)
                .with_detail("manifests match live state")),
            Ok(false) => Ok(ProbeResult::new("apps", ResourceState::Absent)
                .with_detail("differences pending")),
            Err(e) => Err(ProbeError::new("apps", e.to_string())),
        }
    }

    async fn apply(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
        self.kube
            .apply_kustomize(&self.dir())
            .await
            .map_err(|e| PhaseError::new(e.to_string()))
    }

    async fn remove(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
        self.kube
            .delete_kustomize(&self.dir())
            .await
            .map_err(|e| PhaseError::new(e.to_string()))
    }
}
