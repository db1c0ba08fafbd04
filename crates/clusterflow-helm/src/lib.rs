//! helm CLI wrapper
//!
//! Wraps the helm CLI for add-on chart management. Installations go
//! through `upgrade --install` so re-running against an existing release
//! converges instead of failing.

pub mod error;

pub use error::{HelmError, Result};

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// helm CLI wrapper
pub struct HelmClient {
    kubeconfig: Option<std::path::PathBuf>,
    timeout: Duration,
}

impl HelmClient {
    pub fn new(kubeconfig: Option<std::path::PathBuf>) -> Self {
        Self {
            kubeconfig,
            timeout: Duration::from_secs(600),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run a helm command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("helm");
        if let Some(kubeconfig) = &self.kubeconfig {
            cmd.arg("--kubeconfig").arg(kubeconfig);
        }
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: helm {}", args.join(" "));

        let run = async {
            let output = cmd.output().await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    HelmError::HelmNotFound
                } else {
                    HelmError::Io(e)
                }
            })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(HelmError::CommandFailed(stderr.trim().to_string()));
            }

            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(HelmError::Timeout(self.timeout.as_secs())),
        }
    }

    /// List releases in a namespace
    pub async fn list_releases(&self, namespace: &str) -> Result<Vec<ReleaseInfo>> {
        let output = self
            .run_command(&["list", "-n", namespace, "-o", "json", "--all"])
            .await?;
        parse_releases(&output)
    }

    /// Find a release by name, `None` if not installed
    pub async fn release(&self, namespace: &str, name: &str) -> Result<Option<ReleaseInfo>> {
        let releases = self.list_releases(namespace).await?;
        Ok(releases.into_iter().find(|r| r.name == name))
    }

    /// Register a chart repository and refresh the index
    pub async fn repo_add(&self, name: &str, url: &str) -> Result<()> {
        self.run_command(&["repo", "add", name, url, "--force-update"])
            .await?;
        self.run_command(&["repo", "update", name]).await?;
        Ok(())
    }

    /// Install or upgrade a release (idempotent by construction)
    pub async fn upgrade_install(
        &self,
        release: &str,
        chart: &str,
        namespace: &str,
        version: Option<&str>,
        values: Option<&Path>,
    ) -> Result<()> {
        let mut args = vec![
            "upgrade",
            "--install",
            release,
            chart,
            "-n",
            namespace,
            "--create-namespace",
            "--wait",
        ];

        if let Some(version) = version {
            args.push("--version");
            args.push(version);
        }

        let values_str;
        if let Some(values) = values {
            values_str = values.display().to_string();
            args.push("-f");
            args.push(&values_str);
        }

        self.run_command(&args).await?;
        Ok(())
    }

    /// Uninstall a release. Missing releases are not an error.
    pub async fn uninstall(&self, release: &str, namespace: &str) -> Result<()> {
        match self
            .run_command(&["uninstall", release, "-n", namespace])
            .await
        {
            Ok(_) => Ok(()),
            Err(HelmError::CommandFailed(stderr)) if stderr.contains("not found") => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// A helm release, distilled from `helm list -o json`
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseInfo {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    pub status: String,
    #[serde(default)]
    pub chart: String,
    #[serde(default)]
    pub app_version: String,
}

impl ReleaseInfo {
    pub fn is_deployed(&self) -> bool {
        self.status == "deployed"
    }
}

fn parse_releases(json: &str) -> Result<Vec<ReleaseInfo>> {
    if json.trim().is_empty() || json.trim() == "[]" {
        return Ok(Vec::new());
    }
    let releases: Vec<ReleaseInfo> = serde_json::from_str(json)?;
    Ok(releases)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_releases() {
        let json = r#"[
            {
                "name": "cilium",
                "namespace": "kube-system",
                "status": "deployed",
                "chart": "cilium-1.16.5",
                "app_version": "1.16.5"
            },
            {
                "name": "longhorn",
                "namespace": "longhorn-system",
                "status": "pending-install",
                "chart": "longhorn-1.7.2",
                "app_version": "v1.7.2"
            }
        ]"#;

        let releases = parse_releases(json).unwrap();
        assert_eq!(releases.len(), 2);
        assert!(releases[0].is_deployed());
        assert!(!releases[1].is_deployed());
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_releases("").unwrap().is_empty());
        assert!(parse_releases("[]").unwrap().is_empty());
    }
}
