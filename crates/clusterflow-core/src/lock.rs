//! Run lock
//!
//! The cluster is an exclusively-mutated shared resource for the
//! duration of a run, so a second concurrent invocation against the same
//! project is refused via a lock file under `.clusterflow/`.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

const LOCK_DIR: &str = ".clusterflow";
const LOCK_FILE: &str = "lock.json";

/// Locks older than this are assumed left behind by a killed process
const STALE_AFTER_HOURS: i64 = 1;

/// Lock information
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    pid: u32,
    workflow: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for the run lock
pub struct RunLock {
    lock_path: PathBuf,
    released: bool,
}

impl RunLock {
    /// Acquire the run lock for `project_root`, refusing if another run
    /// holds a non-stale lock.
    pub async fn acquire(project_root: impl AsRef<Path>, workflow: &str) -> Result<Self> {
        let dir = project_root.as_ref().join(LOCK_DIR);
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
        }

        let lock_path = dir.join(LOCK_FILE);

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            match serde_json::from_str::<LockInfo>(&content) {
                Ok(info) => {
                    let age = Utc::now().signed_duration_since(info.acquired_at);
                    if age.num_hours() < STALE_AFTER_HOURS {
                        return Err(CoreError::Lock(format!(
                            "{} (pid {}) is running '{}' since {}",
                            info.holder, info.pid, info.workflow, info.acquired_at
                        )));
                    }
                    tracing::warn!(
                        holder = %info.holder,
                        pid = info.pid,
                        "Removing stale run lock"
                    );
                }
                Err(_) => {
                    tracing::warn!("Removing unreadable run lock");
                }
            }
        }

        let info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            workflow: workflow.to_string(),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!(path = %lock_path.display(), "Acquired run lock");
        Ok(Self {
            lock_path,
            released: false,
        })
    }

    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released run lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            // Synchronous cleanup in drop - not ideal but necessary
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
