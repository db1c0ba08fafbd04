//! Phase executor
//!
//! Executes a workflow's phase list strictly in order (or in reverse for
//! teardown), one phase at a time. For each phase: probe, optionally
//! consult the confirmation gate, then execute or skip. A `fatal` phase
//! failure halts the run, a `warn` failure is recorded and the run
//! continues, a declined confirmation is a clean abort, distinct from a
//! failure.

use crate::confirm::{ConfirmationGate, StdinGate};
use crate::context::ExecutionContext;
use crate::phase::{IdempotencyPolicy, Phase, PhaseStatus, ProbeResult, ResourceState, Severity};
use crate::poll::{poll_until, retry_probe, PollConfig, PollOutcome, RetryConfig};
use chrono::{DateTime, Utc};
use colored::Colorize;

/// Executor tuning knobs
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Retry policy for precondition probes
    pub probe_retry: RetryConfig,

    /// Bounded wait for a resource to disappear after a graceful removal
    pub removal_wait: PollConfig,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            probe_retry: RetryConfig::default(),
            removal_wait: PollConfig::new(
                std::time::Duration::from_secs(5),
                std::time::Duration::from_secs(120),
            ),
        }
    }
}

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every phase succeeded or was skipped
    Clean,
    /// At least one warn-severity failure, no fatal
    Warnings,
    /// A fatal phase failure halted the run
    FatalFailure,
    /// The user declined a confirmation; clean termination
    Aborted,
    /// Cancellation was requested mid-run
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Clean => write!(f, "clean"),
            RunStatus::Warnings => write!(f, "completed with warnings"),
            RunStatus::FatalFailure => write!(f, "fatal failure"),
            RunStatus::Aborted => write!(f, "aborted by user"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Recorded outcome of a single phase
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    pub name: String,
    pub status: PhaseStatus,
    pub detail: Option<String>,
}

impl PhaseOutcome {
    fn new(name: &str, status: PhaseStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Summary of a whole run, returned by the executor and printed at the
/// end of every invocation regardless of outcome.
#[derive(Debug)]
pub struct RunReport {
    pub workflow: String,
    pub target: String,
    pub status: RunStatus,
    pub outcomes: Vec<PhaseOutcome>,
    pub warnings: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// A run is clean only if no phase failed fatally
    pub fn is_clean(&self) -> bool {
        self.status != RunStatus::FatalFailure
    }

    /// Process exit code: non-zero only for a fatal failure. A declined
    /// confirmation and a warn-only run both exit 0.
    pub fn exit_code(&self) -> i32 {
        if self.status == RunStatus::FatalFailure {
            1
        } else {
            0
        }
    }

    pub fn count(&self, status: PhaseStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Print the per-phase outcomes and the final status
    pub fn print_summary(&self) {
        println!();
        println!(
            "{}",
            format!("── {} summary ({}) ──", self.workflow, self.target).bold()
        );

        for outcome in &self.outcomes {
            let (glyph, label) = match outcome.status {
                PhaseStatus::Succeeded => ("✓".green(), outcome.status.to_string().green()),
                PhaseStatus::Skipped | PhaseStatus::Simulated => {
                    ("-".dimmed(), outcome.status.to_string().dimmed())
                }
                PhaseStatus::FailedWarn => ("⚠".yellow(), outcome.status.to_string().yellow()),
                PhaseStatus::FailedFatal => ("✗".red(), outcome.status.to_string().red()),
                PhaseStatus::Pending | PhaseStatus::Running => {
                    ("•".dimmed(), outcome.status.to_string().dimmed())
                }
            };

            match &outcome.detail {
                Some(detail) => println!("  {} {:<20} {} ({})", glyph, outcome.name, label, detail),
                None => println!("  {} {:<20} {}", glyph, outcome.name, label),
            }
        }

        let duration = self
            .finished_at
            .signed_duration_since(self.started_at)
            .num_seconds();

        println!();
        println!(
            "  {} succeeded, {} skipped, {} warnings, {}s elapsed",
            self.count(PhaseStatus::Succeeded),
            self.count(PhaseStatus::Skipped) + self.count(PhaseStatus::Simulated),
            self.warnings,
            duration
        );

        let status_line = match self.status {
            RunStatus::Clean => self.status.to_string().green().bold(),
            RunStatus::Warnings => self.status.to_string().yellow().bold(),
            RunStatus::FatalFailure => self.status.to_string().red().bold(),
            RunStatus::Aborted | RunStatus::Cancelled => self.status.to_string().yellow().bold(),
        };
        println!("  status: {}", status_line);
    }
}

/// What the run loop should do after a phase
enum Flow {
    Continue,
    Halt(RunStatus),
}

/// After a removal, an absent resource is done and an unknown state is
/// accepted as done; only a resource still observed (present or
/// terminating) counts as stuck.
fn removal_complete(state: ResourceState) -> bool {
    matches!(state, ResourceState::Absent | ResourceState::Unknown)
}

/// The phase executor.
///
/// Holds no per-run state; everything mutable lives in the report being
/// built, so one executor can serve consecutive runs.
pub struct Executor {
    options: ExecutorOptions,
    gate: Box<dyn ConfirmationGate>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self {
            options: ExecutorOptions::default(),
            gate: Box::new(StdinGate),
        }
    }

    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_gate(mut self, gate: Box<dyn ConfirmationGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Execute `phases` strictly in order.
    pub async fn run(
        &self,
        workflow: &str,
        phases: &[Phase],
        ctx: &ExecutionContext,
    ) -> RunReport {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(phases.len());
        let mut warnings = 0u32;
        let mut status = RunStatus::Clean;

        tracing::info!(workflow, target = %ctx.target, phases = phases.len(), "Run starting");

        for phase in phases {
            if ctx.is_cancelled() {
                tracing::info!(workflow, "Cancellation requested, halting run");
                status = RunStatus::Cancelled;
                break;
            }

            println!();
            println!("{}", format!("▶ {}", phase.name).green().bold());

            let (outcome, flow) = self.forward_phase(phase, ctx, &mut warnings).await;
            outcomes.push(outcome);

            // A cancellation that arrived mid-phase wins over the phase's
            // own verdict: the run is cancelled, not fatal-failed.
            if ctx.is_cancelled() && !matches!(flow, Flow::Halt(RunStatus::Aborted)) {
                tracing::info!(workflow, "Cancellation requested, halting run");
                status = RunStatus::Cancelled;
                break;
            }

            if let Flow::Halt(halt_status) = flow {
                status = halt_status;
                break;
            }
        }

        if status == RunStatus::Clean && warnings > 0 {
            status = RunStatus::Warnings;
        }

        let report = RunReport {
            workflow: workflow.to_string(),
            target: ctx.target.clone(),
            status,
            outcomes,
            warnings,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(workflow, status = %report.status, warnings, "Run finished");
        report
    }

    /// Execute removal actions for `phases` in reverse order, with the
    /// same severity and confirmation rules as the forward direction,
    /// plus a forced-cleanup fallback for resources stuck terminating.
    ///
    /// With `preserve_data`, phases tagged data-destructive are skipped
    /// regardless of severity.
    pub async fn run_reverse(
        &self,
        workflow: &str,
        phases: &[Phase],
        ctx: &ExecutionContext,
        preserve_data: bool,
    ) -> RunReport {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(phases.len());
        let mut warnings = 0u32;
        let mut status = RunStatus::Clean;

        tracing::info!(workflow, target = %ctx.target, phases = phases.len(), "Reverse run starting");

        for phase in phases.iter().rev() {
            if ctx.is_cancelled() {
                tracing::info!(workflow, "Cancellation requested, halting run");
                status = RunStatus::Cancelled;
                break;
            }

            println!();
            println!("{}", format!("■ {}", phase.name).yellow().bold());

            if preserve_data && phase.data_destructive {
                println!("  {} skipped: data preserved", "ℹ".dimmed());
                tracing::info!(phase = %phase.name, "Skipping data-destructive phase (preserve-data)");
                outcomes.push(
                    PhaseOutcome::new(&phase.name, PhaseStatus::Skipped)
                        .with_detail("data preserved"),
                );
                continue;
            }

            let (outcome, flow) = self.reverse_phase(phase, ctx, &mut warnings).await;
            outcomes.push(outcome);

            if ctx.is_cancelled() && !matches!(flow, Flow::Halt(RunStatus::Aborted)) {
                tracing::info!(workflow, "Cancellation requested, halting run");
                status = RunStatus::Cancelled;
                break;
            }

            if let Flow::Halt(halt_status) = flow {
                status = halt_status;
                break;
            }
        }

        if status == RunStatus::Clean && warnings > 0 {
            status = RunStatus::Warnings;
        }

        let report = RunReport {
            workflow: workflow.to_string(),
            target: ctx.target.clone(),
            status,
            outcomes,
            warnings,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(workflow, status = %report.status, warnings, "Reverse run finished");
        report
    }

    /// Probe with bounded retry; a persistent failure degrades to
    /// "unknown state" rather than failing the phase.
    async fn probe(&self, phase: &Phase, ctx: &ExecutionContext) -> ProbeResult {
        match retry_probe(&self.options.probe_retry, &phase.name, || {
            phase.handler.probe(ctx)
        })
        .await
        {
            Ok(result) => {
                tracing::debug!(
                    phase = %phase.name,
                    resource = %result.resource,
                    state = %result.state,
                    "Probe result"
                );
                result
            }
            Err(e) => {
                tracing::warn!(phase = %phase.name, error = %e, "Probe failed, treating state as unknown");
                ProbeResult::unknown(&phase.name, e.detail)
            }
        }
    }

    /// Consult the gate for a destructive phase. Returns false on decline.
    fn gate_allows(&self, phase: &Phase, ctx: &ExecutionContext) -> bool {
        if !phase.destructive || ctx.dry_run() || ctx.auto_confirm {
            return true;
        }

        let message = format!("Phase '{}' will {}. Continue?", phase.name, phase.description);
        if self.gate.confirm(&message) {
            true
        } else {
            println!("  {} declined", "✗".yellow());
            tracing::info!(phase = %phase.name, "Confirmation declined, aborting run");
            false
        }
    }

    async fn forward_phase(
        &self,
        phase: &Phase,
        ctx: &ExecutionContext,
        warnings: &mut u32,
    ) -> (PhaseOutcome, Flow) {
        let probe = self.probe(phase, ctx).await;

        if phase.idempotency == IdempotencyPolicy::SkipIfPresent && probe.exists() {
            println!(
                "  {} already in desired state ({})",
                "ℹ".dimmed(),
                probe.state
            );
            tracing::info!(phase = %phase.name, state = %probe.state, "Phase skipped: already present");
            let detail = probe
                .detail
                .unwrap_or_else(|| format!("already {}", probe.state));
            return (
                PhaseOutcome::new(&phase.name, PhaseStatus::Skipped).with_detail(detail),
                Flow::Continue,
            );
        }

        if !self.gate_allows(phase, ctx) {
            return (
                PhaseOutcome::new(&phase.name, PhaseStatus::Pending)
                    .with_detail("confirmation declined"),
                Flow::Halt(RunStatus::Aborted),
            );
        }

        if ctx.dry_run() {
            println!("  {} (dry-run) would {}", "○".cyan(), phase.description);
            tracing::info!(phase = %phase.name, action = %phase.description, "Dry-run: action skipped");
            return (
                PhaseOutcome::new(&phase.name, PhaseStatus::Simulated),
                Flow::Continue,
            );
        }

        tracing::info!(phase = %phase.name, "Executing action");
        match phase.handler.apply(ctx).await {
            Ok(()) => {
                println!("  {} {}", "✓".green(), phase.description);
                tracing::info!(phase = %phase.name, "Phase succeeded");
                (
                    PhaseOutcome::new(&phase.name, PhaseStatus::Succeeded),
                    Flow::Continue,
                )
            }
            Err(e) => self.classify_failure(phase, e.0, warnings),
        }
    }

    async fn reverse_phase(
        &self,
        phase: &Phase,
        ctx: &ExecutionContext,
        warnings: &mut u32,
    ) -> (PhaseOutcome, Flow) {
        let probe = self.probe(phase, ctx).await;

        if probe.state.is_absent() {
            println!("  {} not present", "ℹ".dimmed());
            tracing::info!(phase = %phase.name, "Phase skipped: nothing to remove");
            return (
                PhaseOutcome::new(&phase.name, PhaseStatus::Skipped).with_detail("not present"),
                Flow::Continue,
            );
        }

        if !self.gate_allows(phase, ctx) {
            return (
                PhaseOutcome::new(&phase.name, PhaseStatus::Pending)
                    .with_detail("confirmation declined"),
                Flow::Halt(RunStatus::Aborted),
            );
        }

        if ctx.dry_run() {
            println!("  {} (dry-run) would remove {}", "○".cyan(), phase.name);
            tracing::info!(phase = %phase.name, "Dry-run: removal skipped");
            return (
                PhaseOutcome::new(&phase.name, PhaseStatus::Simulated),
                Flow::Continue,
            );
        }

        tracing::info!(phase = %phase.name, "Executing removal");
        if let Err(e) = phase.handler.remove(ctx).await {
            return self.classify_failure(phase, e.0, warnings);
        }

        self.await_removal(phase, ctx, warnings).await
    }

    /// After a graceful removal, wait (bounded) for the resource to be
    /// gone. A resource stuck terminating past the bound gets the
    /// forced-cleanup fallback, recorded as a warning, never a silent
    /// success.
    async fn await_removal(
        &self,
        phase: &Phase,
        ctx: &ExecutionContext,
        warnings: &mut u32,
    ) -> (PhaseOutcome, Flow) {
        let cancel = ctx.cancel_flag();
        let outcome = poll_until(&self.options.removal_wait, &phase.name, &cancel, || async {
            match phase.handler.probe(ctx).await {
                Ok(result) => removal_complete(result.state),
                Err(_) => false,
            }
        })
        .await;

        match outcome {
            PollOutcome::Satisfied => {
                println!("  {} removed", "✓".green());
                tracing::info!(phase = %phase.name, "Removal complete");
                (
                    PhaseOutcome::new(&phase.name, PhaseStatus::Succeeded),
                    Flow::Continue,
                )
            }
            PollOutcome::Cancelled => {
                tracing::info!(phase = %phase.name, "Removal wait cancelled");
                (
                    PhaseOutcome::new(&phase.name, PhaseStatus::Succeeded)
                        .with_detail("removal issued, wait cancelled"),
                    Flow::Halt(RunStatus::Cancelled),
                )
            }
            PollOutcome::TimedOut => {
                // One more look: distinguish "slow but finished" from stuck
                let state = match phase.handler.probe(ctx).await {
                    Ok(result) => result.state,
                    Err(_) => ResourceState::Unknown,
                };

                if removal_complete(state) {
                    println!("  {} removed", "✓".green());
                    return (
                        PhaseOutcome::new(&phase.name, PhaseStatus::Succeeded),
                        Flow::Continue,
                    );
                }

                println!(
                    "  {} stuck in {} state, applying forced cleanup",
                    "⚠".yellow(),
                    state
                );
                tracing::warn!(
                    phase = %phase.name,
                    state = %state,
                    "Graceful removal timed out, applying forced cleanup"
                );
                *warnings += 1;

                match phase.handler.force_remove(ctx).await {
                    Ok(()) => (
                        PhaseOutcome::new(&phase.name, PhaseStatus::Succeeded)
                            .with_detail("forced cleanup after graceful removal timed out"),
                        Flow::Continue,
                    ),
                    Err(e) => self.classify_failure(phase, e.0, warnings),
                }
            }
        }
    }

    fn classify_failure(
        &self,
        phase: &Phase,
        detail: String,
        warnings: &mut u32,
    ) -> (PhaseOutcome, Flow) {
        match phase.severity {
            Severity::Fatal => {
                eprintln!("  {} {}", "✗".red().bold(), detail);
                tracing::error!(phase = %phase.name, error = %detail, "Fatal phase failure, halting run");
                (
                    PhaseOutcome::new(&phase.name, PhaseStatus::FailedFatal).with_detail(detail),
                    Flow::Halt(RunStatus::FatalFailure),
                )
            }
            Severity::Warn => {
                println!("  {} {}", "⚠".yellow(), detail);
                tracing::warn!(phase = %phase.name, error = %detail, "Phase failed (warn), continuing");
                *warnings += 1;
                (
                    PhaseOutcome::new(&phase.name, PhaseStatus::FailedWarn).with_detail(detail),
                    Flow::Continue,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::testing::ScriptedGate;
    use crate::context::ExecutionMode;
    use crate::error::{PhaseError, ProbeError};
    use crate::phase::PhaseHandler;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Scriptable handler recording every call in a shared log
    struct Fake {
        name: &'static str,
        /// State reported before apply/remove ran
        state: ResourceState,
        /// State reported once remove has been called
        state_after_remove: ResourceState,
        fail_apply: bool,
        fail_probe: bool,
        removed: AtomicBool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Fake {
        fn new(name: &'static str, state: ResourceState, log: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                state,
                state_after_remove: ResourceState::Absent,
                fail_apply: false,
                fail_probe: false,
                removed: AtomicBool::new(false),
                log,
            }
        }

        fn failing(mut self) -> Self {
            self.fail_apply = true;
            self
        }

        fn probe_error(mut self) -> Self {
            self.fail_probe = true;
            self
        }

        fn stuck_terminating(mut self) -> Self {
            self.state_after_remove = ResourceState::Terminating;
            self
        }
    }

    #[async_trait]
    impl PhaseHandler for Fake {
        async fn probe(&self, _ctx: &ExecutionContext) -> Result<ProbeResult, ProbeError> {
            if self.fail_probe {
                return Err(ProbeError::new(self.name, "connection refused"));
            }
            let state = if self.removed.load(Ordering::SeqCst) {
                self.state_after_remove
            } else {
                self.state
            };
            Ok(ProbeResult::new(self.name, state))
        }

        async fn apply(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
            self.log.lock().unwrap().push(format!("apply:{}", self.name));
            if self.fail_apply {
                return Err(PhaseError::new("boom"));
            }
            Ok(())
        }

        async fn remove(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("remove:{}", self.name));
            self.removed.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn force_remove(&self, _ctx: &ExecutionContext) -> Result<(), PhaseError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("force:{}", self.name));
            Ok(())
        }
    }

    fn test_executor(gate: ScriptedGate) -> Executor {
        Executor::new()
            .with_options(ExecutorOptions {
                probe_retry: RetryConfig {
                    max_attempts: 2,
                    delay: Duration::from_millis(1),
                },
                removal_wait: PollConfig::new(Duration::from_millis(1), Duration::from_millis(20)),
            })
            .with_gate(Box::new(gate))
    }

    fn apply_ctx() -> ExecutionContext {
        ExecutionContext::new(ExecutionMode::Apply, false, "test-cluster")
    }

    fn auto_ctx() -> ExecutionContext {
        ExecutionContext::new(ExecutionMode::Apply, true, "test-cluster")
    }

    #[tokio::test]
    async fn test_phases_run_in_declared_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let phases = vec![
            Phase::new("a", "do a", Arc::new(Fake::new("a", ResourceState::Absent, log.clone()))),
            Phase::new("b", "do b", Arc::new(Fake::new("b", ResourceState::Absent, log.clone()))),
            Phase::new("c", "do c", Arc::new(Fake::new("c", ResourceState::Absent, log.clone()))),
        ];

        let report = test_executor(ScriptedGate::new(true))
            .run("rebuild", &phases, &auto_ctx())
            .await;

        assert_eq!(report.status, RunStatus::Clean);
        assert_eq!(*log.lock().unwrap(), vec!["apply:a", "apply:b", "apply:c"]);
    }

    #[tokio::test]
    async fn test_present_resources_are_skipped() {
        // Second run against a system already in target state: everything
        // skipped, no action issued.
        let log = Arc::new(Mutex::new(Vec::new()));
        let phases = vec![
            Phase::new("a", "do a", Arc::new(Fake::new("a", ResourceState::Ready, log.clone()))),
            Phase::new("b", "do b", Arc::new(Fake::new("b", ResourceState::Present, log.clone()))),
        ];

        let report = test_executor(ScriptedGate::new(true))
            .run("rebuild", &phases, &auto_ctx())
            .await;

        assert_eq!(report.status, RunStatus::Clean);
        assert_eq!(report.count(PhaseStatus::Skipped), 2);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_always_run_ignores_probe() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let phases = vec![
            Phase::new("a", "do a", Arc::new(Fake::new("a", ResourceState::Ready, log.clone())))
                .always_run(),
        ];

        let report = test_executor(ScriptedGate::new(true))
            .run("rebuild", &phases, &auto_ctx())
            .await;

        assert_eq!(report.count(PhaseStatus::Succeeded), 1);
        assert_eq!(*log.lock().unwrap(), vec!["apply:a"]);
    }

    #[tokio::test]
    async fn test_warn_failure_continues_fatal_halts() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let phases = vec![
            Phase::new("a", "do a", Arc::new(Fake::new("a", ResourceState::Absent, log.clone()).failing()))
                .warn_on_failure(),
            Phase::new("b", "do b", Arc::new(Fake::new("b", ResourceState::Absent, log.clone()).failing())),
            Phase::new("c", "do c", Arc::new(Fake::new("c", ResourceState::Absent, log.clone()))),
        ];

        let report = test_executor(ScriptedGate::new(true))
            .run("rebuild", &phases, &auto_ctx())
            .await;

        assert_eq!(report.status, RunStatus::FatalFailure);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.warnings, 1);
        assert_eq!(report.count(PhaseStatus::FailedWarn), 1);
        assert_eq!(report.count(PhaseStatus::FailedFatal), 1);
        // c never ran: the fatal failure on b halted the run
        assert_eq!(*log.lock().unwrap(), vec!["apply:a", "apply:b"]);
    }

    #[tokio::test]
    async fn test_dry_run_never_mutates_nor_prompts() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new(ScriptedGate::new(false));
        let phases = vec![
            Phase::new("wipe", "wipe everything", Arc::new(Fake::new("wipe", ResourceState::Absent, log.clone())))
                .destructive(),
        ];

        let executor = Executor::new()
            .with_options(ExecutorOptions {
                probe_retry: RetryConfig {
                    max_attempts: 2,
                    delay: Duration::from_millis(1),
                },
                removal_wait: PollConfig::new(Duration::from_millis(1), Duration::from_millis(20)),
            })
            .with_gate(Box::new(gate.clone()));
        let ctx = ExecutionContext::new(ExecutionMode::DryRun, false, "test-cluster");
        let report = executor.run("teardown", &phases, &ctx).await;

        assert_eq!(report.status, RunStatus::Clean);
        assert_eq!(report.count(PhaseStatus::Simulated), 1);
        assert!(log.lock().unwrap().is_empty());
        // the gate is never consulted in dry-run
        assert_eq!(gate.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_decline_is_clean_abort() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let phases = vec![
            Phase::new("a", "do a", Arc::new(Fake::new("a", ResourceState::Absent, log.clone()))),
            Phase::new("wipe", "wipe data", Arc::new(Fake::new("wipe", ResourceState::Absent, log.clone())))
                .destructive(),
            Phase::new("c", "do c", Arc::new(Fake::new("c", ResourceState::Absent, log.clone()))),
        ];

        let report = test_executor(ScriptedGate::new(false))
            .run("teardown", &phases, &apply_ctx())
            .await;

        assert_eq!(report.status, RunStatus::Aborted);
        assert_eq!(report.exit_code(), 0);
        // nothing executed beyond the prompt
        assert_eq!(*log.lock().unwrap(), vec!["apply:a"]);
    }

    #[tokio::test]
    async fn test_auto_confirm_skips_gate() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let phases = vec![
            Phase::new("wipe", "wipe data", Arc::new(Fake::new("wipe", ResourceState::Absent, log.clone())))
                .destructive(),
        ];

        let gate = Arc::new(ScriptedGate::new(false));
        let executor = test_executor(ScriptedGate::new(false)).with_gate(Box::new(gate.clone()));
        let report = executor.run("teardown", &phases, &auto_ctx()).await;

        assert_eq!(report.status, RunStatus::Clean);
        assert_eq!(*log.lock().unwrap(), vec!["apply:wipe"]);
        assert_eq!(gate.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_probe_error_degrades_to_unknown_and_action_runs() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let phases = vec![
            Phase::new("a", "do a", Arc::new(Fake::new("a", ResourceState::Ready, log.clone()).probe_error())),
        ];

        let report = test_executor(ScriptedGate::new(true))
            .run("rebuild", &phases, &auto_ctx())
            .await;

        // The probe never answered, so the state is unknown and the
        // idempotent action is attempted anyway.
        assert_eq!(report.count(PhaseStatus::Succeeded), 1);
        assert_eq!(*log.lock().unwrap(), vec!["apply:a"]);
    }

    #[tokio::test]
    async fn test_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let phases = vec![
            Phase::new("a", "do a", Arc::new(Fake::new("a", ResourceState::Present, log.clone()))),
            Phase::new("b", "do b", Arc::new(Fake::new("b", ResourceState::Present, log.clone()))),
            Phase::new("c", "do c", Arc::new(Fake::new("c", ResourceState::Present, log.clone()))),
        ];

        let report = test_executor(ScriptedGate::new(true))
            .run_reverse("teardown", &phases, &auto_ctx(), false)
            .await;

        assert_eq!(report.status, RunStatus::Clean);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["remove:c", "remove:b", "remove:a"]
        );
    }

    #[tokio::test]
    async fn test_reverse_skips_absent_resources() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let phases = vec![
            Phase::new("a", "do a", Arc::new(Fake::new("a", ResourceState::Absent, log.clone()))),
        ];

        let report = test_executor(ScriptedGate::new(true))
            .run_reverse("teardown", &phases, &auto_ctx(), false)
            .await;

        assert_eq!(report.count(PhaseStatus::Skipped), 1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preserve_data_skips_tagged_phases() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let phases = vec![
            Phase::new("networking", "cni", Arc::new(Fake::new("networking", ResourceState::Present, log.clone()))),
            Phase::new("storage", "storage", Arc::new(Fake::new("storage", ResourceState::Present, log.clone())))
                .data_destructive(),
        ];

        let report = test_executor(ScriptedGate::new(true))
            .run_reverse("teardown", &phases, &auto_ctx(), true)
            .await;

        assert_eq!(report.status, RunStatus::Clean);
        assert_eq!(*log.lock().unwrap(), vec!["remove:networking"]);
        assert_eq!(report.outcomes[0].detail.as_deref(), Some("data preserved"));
    }

    #[tokio::test]
    async fn test_stuck_terminating_gets_forced_cleanup() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let phases = vec![
            Phase::new("ns", "namespace", Arc::new(
                Fake::new("ns", ResourceState::Present, log.clone()).stuck_terminating(),
            )),
        ];

        let report = test_executor(ScriptedGate::new(true))
            .run_reverse("teardown", &phases, &auto_ctx(), false)
            .await;

        // Forced cleanup is applied and recorded as a warning, never a
        // silent success.
        assert_eq!(report.status, RunStatus::Warnings);
        assert_eq!(report.warnings, 1);
        assert_eq!(report.count(PhaseStatus::Succeeded), 1);
        assert_eq!(*log.lock().unwrap(), vec!["remove:ns", "force:ns"]);
    }

    #[tokio::test]
    async fn test_cancellation_halts_before_next_phase() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ctx = auto_ctx();
        ctx.cancel();

        let phases = vec![
            Phase::new("a", "do a", Arc::new(Fake::new("a", ResourceState::Absent, log.clone()))),
        ];

        let report = test_executor(ScriptedGate::new(true))
            .run("rebuild", &phases, &ctx)
            .await;

        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(report.exit_code(), 0);
        assert!(log.lock().unwrap().is_empty());
    }
}
