//! Verification report
//!
//! The text and JSON renderings are alternate views of the same report;
//! they never diverge.

use crate::check::{CheckResult, CheckStatus};
use colored::Colorize;
use serde::Serialize;

/// Aggregated outcome of a verification run
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub results: Vec<CheckResult>,
    pub passed: usize,
    pub warnings: usize,
    pub failures: usize,
}

impl VerificationReport {
    pub fn new(results: Vec<CheckResult>) -> Self {
        let passed = results
            .iter()
            .filter(|r| r.status == CheckStatus::Pass)
            .count();
        let warnings = results
            .iter()
            .filter(|r| r.status == CheckStatus::Warn)
            .count();
        let failures = results
            .iter()
            .filter(|r| r.status == CheckStatus::Fail)
            .count();

        Self {
            results,
            passed,
            warnings,
            failures,
        }
    }

    /// Non-zero iff any check failed. Warnings alone never fail the run.
    pub fn exit_code(&self) -> i32 {
        if self.failures > 0 {
            1
        } else {
            0
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Print results grouped by category, then the aggregate counts
    pub fn print_text(&self, verbose: bool) {
        let mut current_category = "";

        for result in &self.results {
            if result.category != current_category {
                current_category = &result.category;
                println!();
                println!("{}", format!("【{}】", current_category).bold());
            }

            let glyph = match result.status {
                CheckStatus::Pass => "✓".green(),
                CheckStatus::Warn => "⚠".yellow(),
                CheckStatus::Fail => "✗".red(),
            };

            if verbose || result.status != CheckStatus::Pass {
                println!("  {} {:<28} {}", glyph, result.name, result.detail.dimmed());
            } else {
                println!("  {} {}", glyph, result.name);
            }
        }

        println!();
        let counts = format!(
            "{} passed, {} warnings, {} failures",
            self.passed, self.warnings, self.failures
        );
        if self.failures > 0 {
            println!("{}", counts.red().bold());
        } else if self.warnings > 0 {
            println!("{}", counts.yellow().bold());
        } else {
            println!("{}", counts.green().bold());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, status: CheckStatus) -> CheckResult {
        CheckResult {
            name: name.to_string(),
            category: "test".to_string(),
            status,
            detail: String::new(),
        }
    }

    #[test]
    fn test_counts_and_exit_code() {
        let report = VerificationReport::new(vec![
            result("a", CheckStatus::Pass),
            result("b", CheckStatus::Warn),
            result("c", CheckStatus::Fail),
            result("d", CheckStatus::Pass),
        ]);

        assert_eq!(report.passed, 2);
        assert_eq!(report.warnings, 1);
        assert_eq!(report.failures, 1);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_warnings_alone_exit_zero() {
        let report = VerificationReport::new(vec![
            result("a", CheckStatus::Pass),
            result("b", CheckStatus::Warn),
            result("c", CheckStatus::Pass),
        ]);

        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_json_carries_counts() {
        let report = VerificationReport::new(vec![result("a", CheckStatus::Warn)]);
        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["warnings"], 1);
        assert_eq!(value["results"][0]["status"], "warn");
    }
}
