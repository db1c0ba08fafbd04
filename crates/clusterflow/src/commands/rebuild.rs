use crate::phases::{self, Collaborators, RebuildFlags};
use clusterflow_config::ClusterConfig;
use clusterflow_core::{ExecutionContext, ExecutionMode, Executor, RunLock};
use colored::Colorize;

pub async fn handle(
    config: &ClusterConfig,
    flags: RebuildFlags,
    dry_run: bool,
    yes: bool,
) -> anyhow::Result<i32> {
    println!("{}", "クラスタを再構築します...".green().bold());
    println!("クラスタ: {}", config.name.cyan());
    if dry_run {
        println!("{}", "(dry-run: 実際の変更は行いません)".yellow());
    }

    // 同一ターゲットへの並行実行を拒否
    let lock = RunLock::acquire(".", "rebuild").await?;

    let mode = if dry_run {
        ExecutionMode::DryRun
    } else {
        ExecutionMode::Apply
    };
    let ctx = ExecutionContext::new(mode, yes, &config.name);
    super::install_ctrl_c(&ctx);

    let collab = Collaborators::new(config);
    let phases = phases::rebuild_phases(config, &collab, &flags);

    println!();
    println!("{}", format!("フェーズ ({} 個):", phases.len()).bold());
    for phase in &phases {
        println!("  • {}", phase.name.cyan());
    }

    let report = Executor::new().run("rebuild", &phases, &ctx).await;
    report.print_summary();

    lock.release().await?;
    Ok(report.exit_code())
}
