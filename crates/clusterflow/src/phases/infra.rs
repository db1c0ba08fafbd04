//! インフラ層フェーズ
//!
//! 宣言済みインフラ (OpenTofu) を不透明な apply/destroy ステップとして
//! 扱います。probe は `plan -detailed-exitcode` の結果で「宣言と実態が
//! 一致しているか」を判定します。

use async_trait::async_trait;
use clusterflow_core::{ExecutionContext, PhaseError, PhaseHandler, ProbeError, ProbeResult, ResourceState};
use clusterflow_infra::TofuClient;
use std::sync::Arc;

pub struct InfraPhase {
    tofu: Arc<TofuClient>,
}

impl InfraPhase {
    pub fn new(tofu: Arc<TofuClient>) -> Self {
        Self { tofu }
    }
}

#[async_trait]
impl PhaseHandler for InfraPhase {
    async fn probe(&self, _ctx: &ExecutionContext) -> Result<ProbeResult, ProbeError> {
        match self.tofu.plan_clean().await {
            Ok(true) => Ok(ProbeResult::new("infrastructure", ResourceState::Ready)
                .with_detail("no pending changes")),
            Ok(false) => Ok(ProbeResult::new("infrastructure", ResourceState::Absent)
                .with_detail("changes pending")),
            Err(e) => Err(ProbeError::new("infrastructure", e.to_string())),
        }
    }

    async fn apply(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
        self.tofu
            .init()
            .await
            .map_err(|e| PhaseError::new(e.to_string()))?;
        self.tofu
            .apply()
            .await
            .map_err(|e| PhaseError::new(e.to_string()))
    }

    async fn remove(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
        self.tofu
            .destroy()
            .await
            .map_err(|e| PhaseError::new(e.to_string()))
    }
}
