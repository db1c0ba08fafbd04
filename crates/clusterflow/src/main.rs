mod commands;
mod logging;
mod phases;

use clap::{Parser, Subcommand, ValueEnum};
use clusterflow_backup::BackupScope;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cflow")]
#[command(about = "組む。確かめる。還す。クラスタのライフサイクルを一続きに。", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// backup のスコープ指定
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScopeArg {
    /// すべてのコレクション
    All,
    /// クラスタスコープのリソースのみ
    Cluster,
    /// アプリケーションレベルのリソースのみ
    Apps,
}

impl From<ScopeArg> for BackupScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::All => BackupScope::All,
            ScopeArg::Cluster => BackupScope::Cluster,
            ScopeArg::Apps => BackupScope::Apps,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// クラスタを再構築 (インフラ → ノード → アドオン → アプリ)
    Rebuild {
        /// コントロールプレーンを強制再初期化する
        #[arg(long)]
        init_control_plane: bool,
        /// ノード初期化フェーズをスキップ
        #[arg(long)]
        skip_init: bool,
        /// 監視スタックの導入をスキップ
        #[arg(long)]
        skip_observability: bool,
        /// アプリケーション適用をスキップ
        #[arg(long)]
        skip_apps: bool,
        /// 実行せずに計画のみ表示
        #[arg(short = 'n', long)]
        dry_run: bool,
        /// 確認プロンプトを省略
        #[arg(short, long)]
        yes: bool,
    },
    /// クラスタを逆順に解体
    Teardown {
        /// 解体前バックアップをスキップ
        #[arg(long)]
        skip_backup: bool,
        /// データ破壊フェーズをスキップ (ストレージ等を残す)
        #[arg(long)]
        preserve_data: bool,
        /// インフラ層まで destroy する
        #[arg(long)]
        full_reset: bool,
        /// 実行せずに計画のみ表示
        #[arg(short = 'n', long)]
        dry_run: bool,
        /// 確認プロンプトを省略
        #[arg(short, long)]
        yes: bool,
    },
    /// リソースコレクションをバックアップ
    Backup {
        /// 出力先ディレクトリ (デフォルトは設定の backup.output)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Secret も含めてエクスポートする
        #[arg(long)]
        include_sensitive: bool,
        /// 対象スコープ
        #[arg(long, value_enum, default_value_t = ScopeArg::All)]
        scope: ScopeArg,
    },
    /// クラスタの健全性を検証
    Verify {
        /// 主要チェックのみ実行
        #[arg(short, long)]
        quick: bool,
        /// JSON で出力 (機械可読)
        #[arg(long)]
        json: bool,
        /// pass したチェックも詳細表示
        #[arg(short, long)]
        verbose: bool,
    },
    /// 各ノードに Kubernetes 実行環境を準備
    NodePrepare {
        /// 導入する Kubernetes バージョン (例: 1.31.4)
        #[arg(long)]
        target_version: String,
        /// 実行せずに計画のみ表示
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
    /// 設定を検証
    Validate,
    /// バージョン情報を表示
    Version,
}

impl Commands {
    fn workflow_name(&self) -> &'static str {
        match self {
            Commands::Rebuild { .. } => "rebuild",
            Commands::Teardown { .. } => "teardown",
            Commands::Backup { .. } => "backup",
            Commands::Verify { .. } => "verify",
            Commands::NodePrepare { .. } => "node-prepare",
            Commands::Validate => "validate",
            Commands::Version => "version",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Version と Validate は設定ロード・ログ初期化が不要
    if matches!(cli.command, Commands::Version) {
        println!("clusterflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if matches!(cli.command, Commands::Validate) {
        std::process::exit(commands::validate::handle());
    }

    let log_path = logging::init(cli.command.workflow_name())?;

    // verify --json は stdout を機械可読出力専用にする
    let quiet = matches!(
        cli.command,
        Commands::Verify { json: true, .. }
    );

    // 設定ファイルを検索
    let config_path = match clusterflow_config::find_cluster_file() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{}", "✗ 設定ファイルが見つかりません".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };
    if !quiet {
        println!(
            "設定ファイル: {}",
            config_path.display().to_string().cyan()
        );
    }

    // パース + 検証 (エラーはここで打ち切り)
    let config = match clusterflow_config::parse_kdl_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", "✗ 設定エラー".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Rebuild {
            init_control_plane,
            skip_init,
            skip_observability,
            skip_apps,
            dry_run,
            yes,
        } => {
            let flags = phases::RebuildFlags {
                init_control_plane,
                skip_init,
                skip_observability,
                skip_apps,
            };
            commands::rebuild::handle(&config, flags, dry_run, yes).await?
        }
        Commands::Teardown {
            skip_backup,
            preserve_data,
            full_reset,
            dry_run,
            yes,
        } => {
            commands::teardown::handle(
                &config,
                skip_backup,
                preserve_data,
                full_reset,
                dry_run,
                yes,
            )
            .await?
        }
        Commands::Backup {
            output,
            include_sensitive,
            scope,
        } => commands::backup::handle(&config, output, include_sensitive, scope.into()).await?,
        Commands::Verify {
            quick,
            json,
            verbose,
        } => commands::verify::handle(&config, quick, json, verbose).await?,
        Commands::NodePrepare {
            target_version,
            dry_run,
        } => commands::node_prepare::handle(&config, target_version, dry_run).await?,
        Commands::Validate | Commands::Version => unreachable!(),
    };

    if !quiet {
        println!();
        println!("{}", format!("ログ: {}", log_path.display()).dimmed());
    }

    std::process::exit(code);
}
