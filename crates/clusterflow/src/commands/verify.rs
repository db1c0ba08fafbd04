use clusterflow_config::ClusterConfig;
use clusterflow_helm::HelmClient;
use clusterflow_kube::KubeClient;
use clusterflow_verify::{battery, VerifyEngine};
use colored::Colorize;
use std::sync::Arc;

pub async fn handle(
    config: &ClusterConfig,
    quick: bool,
    json: bool,
    verbose: bool,
) -> anyhow::Result<i32> {
    let kube = Arc::new(KubeClient::new(config.kubeconfig.clone()));
    let helm = Arc::new(HelmClient::new(config.kubeconfig.clone()));
    let checks = battery(config, kube, helm, quick);

    if !json {
        println!("{}", "クラスタを検証します...".blue().bold());
        println!("クラスタ: {}", config.name.cyan());
        println!("チェック数: {}", checks.len());
    }

    let report = VerifyEngine::new().run(&checks).await;

    if json {
        // テキスト出力と同じレポートの別レンダリング
        println!("{}", report.to_json()?);
    } else {
        report.print_text(verbose);
    }

    Ok(report.exit_code())
}
