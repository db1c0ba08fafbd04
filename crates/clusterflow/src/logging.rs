//! 実行ログの初期化
//!
//! 1回の実行につき1つのログファイルを `.clusterflow/logs/` に作成し、
//! コンソール(stderr)には警告以上のみを流します。実行の進捗表示は
//! println ベースなので、情報ログはファイル側に集約します。

use anyhow::Context;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

const LOG_DIR: &str = ".clusterflow/logs";

/// tracing を初期化し、作成したログファイルのパスを返す
pub fn init(workflow: &str) -> anyhow::Result<PathBuf> {
    let log_dir = PathBuf::from(LOG_DIR);
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("ログディレクトリを作成できません: {}", log_dir.display()))?;

    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let log_path = log_dir.join(format!("{}-{}.log", stamp, workflow));
    let file = std::fs::File::create(&log_path)
        .with_context(|| format!("ログファイルを作成できません: {}", log_path.display()))?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(file))
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        );

    let console_layer = tracing_subscriber::fmt::layer()
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::info!(workflow, version = env!("CARGO_PKG_VERSION"), "Invocation started");
    Ok(log_path)
}
