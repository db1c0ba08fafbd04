//! Execution context shared across a run

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Execution mode for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Actions are executed against the external system
    Apply,
    /// Actions are logged and skipped; nothing is mutated
    DryRun,
}

/// Context created once per invocation and shared by reference across
/// phases. Read-mostly: `mode` and `auto_confirm` never change mid-run,
/// only the cancellation flag is flipped (by the Ctrl-C handler).
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Apply or dry-run
    pub mode: ExecutionMode,

    /// Skip all confirmation prompts
    pub auto_confirm: bool,

    /// Name of the cluster this run targets
    pub target: String,

    /// When the invocation started
    pub started_at: DateTime<Utc>,

    cancelled: Arc<AtomicBool>,
}

impl ExecutionContext {
    pub fn new(mode: ExecutionMode, auto_confirm: bool, target: impl Into<String>) -> Self {
        Self {
            mode,
            auto_confirm,
            target: target.into(),
            started_at: Utc::now(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn dry_run(&self) -> bool {
        self.mode == ExecutionMode::DryRun
    }

    /// Shared cancellation flag, handed to the Ctrl-C handler
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Request cancellation. The executor finishes the in-flight external
    /// call and then halts without starting further phases.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_is_shared() {
        let ctx = ExecutionContext::new(ExecutionMode::Apply, false, "test");
        let flag = ctx.cancel_flag();
        assert!(!ctx.is_cancelled());

        flag.store(true, Ordering::SeqCst);
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_dry_run_mode() {
        let ctx = ExecutionContext::new(ExecutionMode::DryRun, true, "test");
        assert!(ctx.dry_run());
        assert!(ctx.auto_confirm);
    }
}
