use crate::phases::{self, Collaborators};
use clusterflow_config::ClusterConfig;
use clusterflow_core::{ExecutionContext, ExecutionMode, Executor, RunLock};
use colored::Colorize;

pub async fn handle(
    config: &ClusterConfig,
    target_version: String,
    dry_run: bool,
) -> anyhow::Result<i32> {
    println!(
        "{}",
        format!("ノードを準備します (kubernetes {})...", target_version)
            .green()
            .bold()
    );
    println!("クラスタ: {}", config.name.cyan());
    println!("対象ノード: {}台", config.nodes.len());
    if dry_run {
        println!("{}", "(dry-run: 実際の変更は行いません)".yellow());
    }

    let lock = RunLock::acquire(".", "node-prepare").await?;

    let mode = if dry_run {
        ExecutionMode::DryRun
    } else {
        ExecutionMode::Apply
    };
    // 破壊的フェーズはないので確認ゲートは不要
    let ctx = ExecutionContext::new(mode, true, &config.name);
    super::install_ctrl_c(&ctx);

    let collab = Collaborators::new(config);
    let phases = phases::node_prepare_phases(config, &collab, &target_version);

    let report = Executor::new().run("node-prepare", &phases, &ctx).await;
    report.print_summary();

    lock.release().await?;
    Ok(report.exit_code())
}
