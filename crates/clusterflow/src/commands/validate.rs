use colored::Colorize;

pub fn handle() -> i32 {
    println!("{}", "設定を検証中...".blue());

    let config_path = match clusterflow_config::find_cluster_file() {
        Ok(path) => path,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ 設定ファイルが見つかりません".red().bold());
            eprintln!("  {}", e);
            return 1;
        }
    };

    println!(
        "設定ファイル: {}",
        config_path.display().to_string().cyan()
    );

    match clusterflow_config::parse_kdl_file(&config_path) {
        Ok(config) => {
            println!("{}", "✓ 設定ファイルは正常です！".green().bold());
            println!();
            println!("サマリー:");
            println!("  クラスタ: {}", config.name.cyan());

            println!("  ノード: {}台", config.nodes.len());
            for node in &config.nodes {
                println!(
                    "    - {} ({}, {})",
                    node.name.cyan(),
                    node.role,
                    node.address
                );
            }

            println!("  アドオン: {}個", config.addons.len());
            for (name, addon) in &config.addons {
                let suffix = if addon.enabled { "" } else { " (無効)" };
                println!("    - {} ({}){}", name.cyan(), addon.chart, suffix);
            }

            if let Some(infra) = &config.infra {
                println!("  IaC: {}", infra.dir.display());
            }
            if let Some(apps) = &config.apps {
                println!("  アプリ: {}", apps.manifests.display());
            }
            println!("  バックアップ出力先: {}", config.backup.output.display());

            0
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ 設定エラー".red().bold());
            eprintln!("  {}", e);
            1
        }
    }
}
