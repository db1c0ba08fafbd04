//! Remote command execution channel
//!
//! Non-interactive ssh to named hosts, used for node bootstrap
//! (kubeadm init/join/reset) and node preparation. BatchMode keeps a
//! missing key from turning into a hung password prompt.

use crate::error::{InfraError, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// ssh channel with fixed connection options
pub struct RemoteShell {
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl Default for RemoteShell {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteShell {
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(600),
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Run `command` on `target` (user@host) and return stdout
    pub async fn run(&self, target: &str, port: u16, command: &str) -> Result<String> {
        let args = ssh_args(target, port, command, self.connect_timeout);

        tracing::debug!(target, port, command, "Running remote command");

        let run = async {
            let output = Command::new("ssh")
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await
                .map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        InfraError::SshNotFound
                    } else {
                        InfraError::Io(e)
                    }
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(InfraError::RemoteFailed {
                    host: target.to_string(),
                    detail: stderr.trim().to_string(),
                });
            }

            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        };

        match tokio::time::timeout(self.command_timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(InfraError::Timeout(self.command_timeout.as_secs())),
        }
    }

    /// Run a command, mapping any remote failure to `Ok(None)`.
    /// For probes where "command absent on the host" is an answer,
    /// not an error.
    pub async fn run_optional(
        &self,
        target: &str,
        port: u16,
        command: &str,
    ) -> Result<Option<String>> {
        match self.run(target, port, command).await {
            Ok(output) => Ok(Some(output)),
            Err(InfraError::RemoteFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn ssh_args(target: &str, port: u16, command: &str, connect_timeout: Duration) -> Vec<String> {
    vec![
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=accept-new".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", connect_timeout.as_secs()),
        "-p".to_string(),
        port.to_string(),
        target.to_string(),
        command.to_string(),
    ]
}
