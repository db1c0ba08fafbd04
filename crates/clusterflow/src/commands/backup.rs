use clusterflow_backup::{BackupEngine, BackupOptions, BackupScope, KubeExporter};
use clusterflow_config::ClusterConfig;
use clusterflow_kube::KubeClient;
use colored::Colorize;
use std::path::PathBuf;

pub async fn handle(
    config: &ClusterConfig,
    output: Option<PathBuf>,
    include_sensitive: bool,
    scope: BackupScope,
) -> anyhow::Result<i32> {
    println!("{}", "バックアップを開始します...".blue().bold());
    println!("クラスタ: {}", config.name.cyan());
    println!("スコープ: {}", scope.as_str().cyan());
    if include_sensitive {
        println!("{}", "⚠ Secret を含むエクスポートです。取り扱いに注意してください".yellow());
    }
    println!();

    let engine = BackupEngine::new(Box::new(KubeExporter::new(KubeClient::new(
        config.kubeconfig.clone(),
    ))));
    let options = BackupOptions {
        cluster: config.name.clone(),
        scope,
        include_sensitive,
        archive: config.backup.archive,
        output_root: output.unwrap_or_else(|| config.backup.output.clone()),
    };

    let outcome = engine.run(&options).await?;
    let manifest = &outcome.manifest;

    println!();
    if manifest.complete {
        println!(
            "{}",
            format!(
                "✓ {} 個のコレクションをエクスポートしました ({} bytes)",
                manifest.succeeded(),
                manifest.total_size_bytes
            )
            .green()
            .bold()
        );
    } else {
        // 部分バックアップも有効な成果物。終了コードは 0 のまま、
        // 内訳はマニフェストに残す
        println!(
            "{}",
            format!(
                "⚠ 部分バックアップ: {} 成功 / {} 失敗",
                manifest.succeeded(),
                manifest.failed()
            )
            .yellow()
            .bold()
        );
        for snapshot in manifest.snapshots.iter().filter(|s| !s.is_ok()) {
            println!(
                "    - {}: {}",
                snapshot.collection,
                snapshot.error.as_deref().unwrap_or("unknown")
            );
        }
    }

    println!("出力先: {}", outcome.dir.display().to_string().cyan());
    if let Some(archive) = &outcome.archive_path {
        println!("アーカイブ: {}", archive.display().to_string().cyan());
    }

    Ok(0)
}
