use crate::phases::{self, Collaborators};
use clusterflow_backup::{BackupEngine, BackupOptions, BackupScope, KubeExporter};
use clusterflow_config::ClusterConfig;
use clusterflow_core::{ExecutionContext, ExecutionMode, Executor, RunLock};
use clusterflow_kube::KubeClient;
use colored::Colorize;

pub async fn handle(
    config: &ClusterConfig,
    skip_backup: bool,
    preserve_data: bool,
    full_reset: bool,
    dry_run: bool,
    yes: bool,
) -> anyhow::Result<i32> {
    println!("{}", "クラスタを解体します...".yellow().bold());
    println!("クラスタ: {}", config.name.cyan());
    if dry_run {
        println!("{}", "(dry-run: 実際の変更は行いません)".yellow());
    }
    if preserve_data {
        println!("{}", "(preserve-data: データ破壊フェーズはスキップ)".cyan());
    }

    let lock = RunLock::acquire(".", "teardown").await?;

    // 解体前バックアップ。失敗しても解体は続行する (確認ゲートが
    // 破壊フェーズを守る)。
    if !skip_backup && !dry_run {
        println!();
        println!("{}", "解体前バックアップを取得中...".blue());

        let engine = BackupEngine::new(Box::new(KubeExporter::new(KubeClient::new(
            config.kubeconfig.clone(),
        ))));
        let options = BackupOptions {
            cluster: config.name.clone(),
            scope: BackupScope::All,
            include_sensitive: false,
            archive: config.backup.archive,
            output_root: config.backup.output.clone(),
        };

        match engine.run(&options).await {
            Ok(outcome) if outcome.manifest.complete => {
                println!("  {} バックアップ完了: {}", "✓".green(), outcome.dir.display());
            }
            Ok(outcome) => {
                println!(
                    "  {} 部分バックアップ ({} 件失敗): {}",
                    "⚠".yellow(),
                    outcome.manifest.failed(),
                    outcome.dir.display()
                );
            }
            Err(e) => {
                println!("  {} バックアップに失敗しました: {}", "⚠".yellow(), e);
                tracing::warn!(error = %e, "Pre-teardown backup failed");
            }
        }
    }

    let mode = if dry_run {
        ExecutionMode::DryRun
    } else {
        ExecutionMode::Apply
    };
    let ctx = ExecutionContext::new(mode, yes, &config.name);
    super::install_ctrl_c(&ctx);

    let collab = Collaborators::new(config);
    let phases = phases::teardown_phases(config, &collab, full_reset);

    println!();
    println!(
        "{}",
        format!("フェーズ ({} 個、逆順に実行):", phases.len()).bold()
    );
    for phase in phases.iter().rev() {
        println!("  • {}", phase.name.cyan());
    }

    let report = Executor::new()
        .run_reverse("teardown", &phases, &ctx, preserve_data)
        .await;
    report.print_summary();

    lock.release().await?;
    Ok(report.exit_code())
}
