//! ClusterFlow verification engine
//!
//! Runs an ordered battery of independent, read-only health checks and
//! aggregates them into a pass/fail/warn report. Checks are dispatched
//! to a bounded pool; results are merged in check-declaration order so
//! the report is deterministic regardless of completion order.

pub mod check;
pub mod checks;
pub mod report;

pub use check::{Check, CheckError, CheckResult, CheckStatus, Verdict};
pub use checks::{battery, release_name};
pub use report::VerificationReport;

use futures_util::stream::{self, StreamExt};

/// The verification engine
pub struct VerifyEngine {
    concurrency: usize,
}

impl Default for VerifyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl VerifyEngine {
    pub fn new() -> Self {
        Self { concurrency: 4 }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run every check. A check body that errors becomes a fail-status
    /// result, never a thrown error.
    pub async fn run(&self, checks: &[Box<dyn Check>]) -> VerificationReport {
        tracing::info!(checks = checks.len(), "Verification starting");

        let results = stream::iter(checks.iter())
            .map(|check| async move {
                tracing::debug!(check = check.name(), "Check starting");
                let verdict = match check.run().await {
                    Ok(verdict) => verdict,
                    Err(e) => Verdict::fail(format!("check error: {}", e)),
                };
                tracing::debug!(check = check.name(), status = %verdict.status, "Check finished");

                CheckResult {
                    name: check.name().to_string(),
                    category: check.category().to_string(),
                    status: verdict.status,
                    detail: verdict.detail,
                }
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let report = VerificationReport::new(results);
        tracing::info!(
            passed = report.passed,
            warnings = report.warnings,
            failures = report.failures,
            "Verification finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Fake {
        name: &'static str,
        status: CheckStatus,
        delay_ms: u64,
        error: bool,
    }

    impl Fake {
        fn new(name: &'static str, status: CheckStatus) -> Self {
            Self {
                name,
                status,
                delay_ms: 0,
                error: false,
            }
        }
    }

    #[async_trait]
    impl Check for Fake {
        fn name(&self) -> &str {
            self.name
        }

        fn category(&self) -> &str {
            "test"
        }

        async fn run(&self) -> Result<Verdict, CheckError> {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.error {
                return Err(CheckError("exploded".to_string()));
            }
            Ok(Verdict {
                status: self.status,
                detail: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_aggregation() {
        let checks: Vec<Box<dyn Check>> = vec![
            Box::new(Fake::new("a", CheckStatus::Pass)),
            Box::new(Fake::new("b", CheckStatus::Warn)),
            Box::new(Fake::new("c", CheckStatus::Fail)),
            Box::new(Fake::new("d", CheckStatus::Pass)),
        ];

        let report = VerifyEngine::new().run(&checks).await;
        assert_eq!(report.passed, 2);
        assert_eq!(report.warnings, 1);
        assert_eq!(report.failures, 1);
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_warnings_do_not_fail_the_run() {
        let checks: Vec<Box<dyn Check>> = vec![
            Box::new(Fake::new("a", CheckStatus::Pass)),
            Box::new(Fake::new("b", CheckStatus::Warn)),
            Box::new(Fake::new("c", CheckStatus::Pass)),
        ];

        let report = VerifyEngine::new().run(&checks).await;
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_results_keep_declaration_order() {
        // The slowest check is declared first; parallel dispatch must
        // not reorder the report.
        let mut slow = Fake::new("slow", CheckStatus::Pass);
        slow.delay_ms = 30;
        let mut mid = Fake::new("mid", CheckStatus::Pass);
        mid.delay_ms = 10;

        let checks: Vec<Box<dyn Check>> = vec![
            Box::new(slow),
            Box::new(mid),
            Box::new(Fake::new("fast", CheckStatus::Pass)),
        ];

        let report = VerifyEngine::new().with_concurrency(3).run(&checks).await;
        let names: Vec<_> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["slow", "mid", "fast"]);
    }

    #[tokio::test]
    async fn test_check_error_becomes_fail_result() {
        let mut broken = Fake::new("broken", CheckStatus::Pass);
        broken.error = true;

        let checks: Vec<Box<dyn Check>> = vec![Box::new(broken)];
        let report = VerifyEngine::new().run(&checks).await;

        assert_eq!(report.failures, 1);
        assert!(report.results[0].detail.contains("exploded"));
    }
}
