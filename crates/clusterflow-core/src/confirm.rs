//! Confirmation gate for destructive operations
//!
//! Destructive phases block on an explicit affirmative response unless
//! auto-confirm is set. Dry-run short-circuits before the gate is ever
//! consulted, so a non-interactive dry run never prompts.

use colored::Colorize;
use std::io::Write;

/// Interactive approval checkpoint before destructive actions.
///
/// A trait so tests and embedders can script responses instead of
/// blocking on stdin.
pub trait ConfirmationGate: Send + Sync {
    /// Present `message` and block for approval. Any non-affirmative
    /// response returns false.
    fn confirm(&self, message: &str) -> bool;
}

/// Gate reading from stdin. Affirmative answers: `y`, `yes`
/// (case-insensitive). Everything else, including EOF, declines.
pub struct StdinGate;

impl ConfirmationGate for StdinGate {
    fn confirm(&self, message: &str) -> bool {
        print!("{} {} ", message.yellow().bold(), "[y/N]:".dimmed());
        if std::io::stdout().flush().is_err() {
            return false;
        }

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }

        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::ConfirmationGate;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted gate for executor tests: answers `response` and counts
    /// how often it was consulted.
    pub struct ScriptedGate {
        pub response: bool,
        pub prompts: AtomicU32,
    }

    impl ScriptedGate {
        pub fn new(response: bool) -> Self {
            Self {
                response,
                prompts: AtomicU32::new(0),
            }
        }

        pub fn prompt_count(&self) -> u32 {
            self.prompts.load(Ordering::SeqCst)
        }
    }

    impl ConfirmationGate for ScriptedGate {
        fn confirm(&self, _message: &str) -> bool {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            self.response
        }
    }

    // Tests keep a handle on the gate after moving it into the executor
    impl ConfirmationGate for std::sync::Arc<ScriptedGate> {
        fn confirm(&self, message: &str) -> bool {
            self.as_ref().confirm(message)
        }
    }
}
