//! OpenTofu CLI wrapper
//!
//! The infrastructure layer is declared elsewhere; this wrapper only
//! drives it as an opaque apply/destroy step and asks whether the
//! declared state already matches reality.

use crate::error::{InfraError, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// OpenTofu CLI wrapper, pinned to one working directory
pub struct TofuClient {
    dir: PathBuf,
    timeout: Duration,
}

impl TofuClient {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            timeout: Duration::from_secs(1800),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let chdir = format!("-chdir={}", self.dir.display());
        let mut cmd = Command::new("tofu");
        cmd.arg(chdir);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    async fn run_command(&self, args: &[&str]) -> Result<String> {
        tracing::debug!("Running: tofu {}", args.join(" "));

        let run = async {
            let output = self.command(args).output().await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    InfraError::TofuNotFound
                } else {
                    InfraError::Io(e)
                }
            })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(InfraError::TofuFailed(stderr.trim().to_string()));
            }

            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(InfraError::Timeout(self.timeout.as_secs())),
        }
    }

    pub async fn init(&self) -> Result<()> {
        self.run_command(&["init", "-input=false", "-no-color"])
            .await?;
        Ok(())
    }

    /// Whether the declared infrastructure already matches reality.
    ///
    /// Uses `plan -detailed-exitcode`: 0 = no changes, 2 = changes
    /// pending, anything else is an error.
    pub async fn plan_clean(&self) -> Result<bool> {
        tracing::debug!("Running: tofu plan -detailed-exitcode");

        let run = async {
            let output = self
                .command(&["plan", "-detailed-exitcode", "-input=false", "-no-color"])
                .output()
                .await
                .map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        InfraError::TofuNotFound
                    } else {
                        InfraError::Io(e)
                    }
                })?;

            match output.status.code() {
                Some(0) => Ok(true),
                Some(2) => Ok(false),
                _ => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(InfraError::TofuFailed(stderr.trim().to_string()))
                }
            }
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(InfraError::Timeout(self.timeout.as_secs())),
        }
    }

    pub async fn apply(&self) -> Result<()> {
        self.run_command(&["apply", "-auto-approve", "-input=false", "-no-color"])
            .await?;
        Ok(())
    }

    pub async fn destroy(&self) -> Result<()> {
        self.run_command(&["destroy", "-auto-approve", "-input=false", "-no-color"])
            .await?;
        Ok(())
    }
}
