//! The built-in check battery
//!
//! Classification rule: `fail` only for conditions that make the
//! cluster non-functional for its primary purpose (API down, no CNI,
//! no DNS, no nodes); degraded-but-functioning conditions are `warn`.

use crate::check::{Check, CheckError, Verdict};
use async_trait::async_trait;
use clusterflow_config::ClusterConfig;
use clusterflow_helm::HelmClient;
use clusterflow_kube::KubeClient;
use std::sync::Arc;

/// Release name for a chart reference ("cilium/cilium" -> "cilium")
pub fn release_name(chart: &str) -> &str {
    chart.rsplit('/').next().unwrap_or(chart)
}

/// Build the ordered battery for a topology. `quick` keeps only the
/// checks marked quick.
pub fn battery(
    config: &ClusterConfig,
    kube: Arc<KubeClient>,
    helm: Arc<HelmClient>,
    quick: bool,
) -> Vec<Box<dyn Check>> {
    let mut checks: Vec<Box<dyn Check>> = vec![
        Box::new(ApiReachable { kube: kube.clone() }),
        Box::new(NodesReady {
            kube: kube.clone(),
            expected: config.nodes.len(),
        }),
    ];

    if let Some(addon) = config.addon("networking") {
        checks.push(Box::new(CniReady {
            kube: kube.clone(),
            namespace: addon.namespace.clone(),
            daemonset: release_name(&addon.chart).to_string(),
        }));
    }

    checks.push(Box::new(CoreDnsReady { kube: kube.clone() }));
    checks.push(Box::new(StorageClassPresent { kube: kube.clone() }));

    for name in ["ingress", "observability", "secrets", "ci-tooling"] {
        if let Some(addon) = config.addon(name) {
            checks.push(Box::new(AddonDeployed {
                helm: helm.clone(),
                addon: name.to_string(),
                release: release_name(&addon.chart).to_string(),
                namespace: addon.namespace.clone(),
            }));
        }
    }

    checks.push(Box::new(UnhealthyPods { kube }));

    if quick {
        checks.retain(|c| c.quick());
    }

    checks
}

/// API server readiness endpoint answers
struct ApiReachable {
    kube: Arc<KubeClient>,
}

#[async_trait]
impl Check for ApiReachable {
    fn name(&self) -> &str {
        "api-server reachable"
    }

    fn category(&self) -> &str {
        "control-plane"
    }

    fn quick(&self) -> bool {
        true
    }

    async fn run(&self) -> Result<Verdict, CheckError> {
        if self.kube.api_ready().await? {
            Ok(Verdict::pass("/readyz answered ok"))
        } else {
            Ok(Verdict::fail("/readyz did not answer ok"))
        }
    }
}

/// Every topology node registered and Ready
struct NodesReady {
    kube: Arc<KubeClient>,
    expected: usize,
}

#[async_trait]
impl Check for NodesReady {
    fn name(&self) -> &str {
        "nodes ready"
    }

    fn category(&self) -> &str {
        "nodes"
    }

    fn quick(&self) -> bool {
        true
    }

    async fn run(&self) -> Result<Verdict, CheckError> {
        let nodes = self.kube.get_nodes().await?;
        if nodes.is_empty() {
            return Ok(Verdict::fail("no nodes registered"));
        }

        let ready = nodes.iter().filter(|n| n.ready).count();
        if ready == 0 {
            return Ok(Verdict::fail(format!("0/{} nodes ready", nodes.len())));
        }

        if ready < self.expected || ready < nodes.len() {
            let stragglers: Vec<_> = nodes
                .iter()
                .filter(|n| !n.ready)
                .map(|n| n.name.as_str())
                .collect();
            return Ok(Verdict::warn(format!(
                "{}/{} nodes ready (not ready: {})",
                ready,
                self.expected,
                stragglers.join(", ")
            )));
        }

        Ok(Verdict::pass(format!("{}/{} nodes ready", ready, self.expected)))
    }
}

/// CNI daemonset fully scheduled
struct CniReady {
    kube: Arc<KubeClient>,
    namespace: String,
    daemonset: String,
}

#[async_trait]
impl Check for CniReady {
    fn name(&self) -> &str {
        "cni daemonset"
    }

    fn category(&self) -> &str {
        "networking"
    }

    fn quick(&self) -> bool {
        true
    }

    async fn run(&self) -> Result<Verdict, CheckError> {
        let status = self
            .kube
            .daemonset_status(&self.namespace, &self.daemonset)
            .await?;

        match status {
            None => Ok(Verdict::fail(format!(
                "daemonset {}/{} not found",
                self.namespace, self.daemonset
            ))),
            Some(s) if s.desired == 0 => Ok(Verdict::fail("daemonset has no scheduled pods")),
            Some(s) if !s.fully_ready() => Ok(Verdict::warn(format!(
                "{}/{} pods ready",
                s.ready, s.desired
            ))),
            Some(s) => Ok(Verdict::pass(format!("{}/{} pods ready", s.ready, s.desired))),
        }
    }
}

/// Cluster DNS deployment available
struct CoreDnsReady {
    kube: Arc<KubeClient>,
}

#[async_trait]
impl Check for CoreDnsReady {
    fn name(&self) -> &str {
        "coredns available"
    }

    fn category(&self) -> &str {
        "dns"
    }

    fn quick(&self) -> bool {
        true
    }

    async fn run(&self) -> Result<Verdict, CheckError> {
        let status = self.kube.deployment_status("kube-system", "coredns").await?;

        match status {
            None => Ok(Verdict::fail("coredns deployment not found")),
            Some(s) if s.ready == 0 => Ok(Verdict::fail("no coredns replicas ready")),
            Some(s) if !s.fully_ready() => Ok(Verdict::warn(format!(
                "{}/{} replicas ready",
                s.ready, s.desired
            ))),
            Some(s) => Ok(Verdict::pass(format!("{}/{} replicas ready", s.ready, s.desired))),
        }
    }
}

/// At least one storage class registered
struct StorageClassPresent {
    kube: Arc<KubeClient>,
}

#[async_trait]
impl Check for StorageClassPresent {
    fn name(&self) -> &str {
        "storage class present"
    }

    fn category(&self) -> &str {
        "storage"
    }

    async fn run(&self) -> Result<Verdict, CheckError> {
        if self.kube.has_storage_class().await? {
            Ok(Verdict::pass("storage class registered"))
        } else {
            // workloads without volume claims still run
            Ok(Verdict::warn("no storage class registered"))
        }
    }
}

/// Optional add-on release deployed
struct AddonDeployed {
    helm: Arc<HelmClient>,
    addon: String,
    release: String,
    namespace: String,
}

#[async_trait]
impl Check for AddonDeployed {
    fn name(&self) -> &str {
        &self.addon
    }

    fn category(&self) -> &str {
        "addons"
    }

    async fn run(&self) -> Result<Verdict, CheckError> {
        let release = self.helm.release(&self.namespace, &self.release).await?;

        match release {
            None => Ok(Verdict::warn(format!(
                "release {}/{} not installed",
                self.namespace, self.release
            ))),
            Some(r) if !r.is_deployed() => {
                Ok(Verdict::warn(format!("release status: {}", r.status)))
            }
            Some(r) => Ok(Verdict::pass(format!("{} deployed", r.chart))),
        }
    }
}

/// Pods stuck outside Running/Succeeded
struct UnhealthyPods {
    kube: Arc<KubeClient>,
}

#[async_trait]
impl Check for UnhealthyPods {
    fn name(&self) -> &str {
        "unhealthy pods"
    }

    fn category(&self) -> &str {
        "workloads"
    }

    async fn run(&self) -> Result<Verdict, CheckError> {
        let pods = self.kube.unhealthy_pods().await?;

        if pods.is_empty() {
            return Ok(Verdict::pass("all pods running"));
        }

        let sample: Vec<_> = pods
            .iter()
            .take(5)
            .map(|p| format!("{}/{} ({})", p.namespace, p.name, p.phase))
            .collect();
        Ok(Verdict::warn(format!(
            "{} pods not running: {}",
            pods.len(),
            sample.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_name() {
        assert_eq!(release_name("cilium/cilium"), "cilium");
        assert_eq!(
            release_name("prometheus-community/kube-prometheus-stack"),
            "kube-prometheus-stack"
        );
        assert_eq!(release_name("longhorn"), "longhorn");
    }
}
