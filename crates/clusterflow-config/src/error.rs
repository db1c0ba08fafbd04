use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("KDLパースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error(
        "設定ファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: cluster.kdl, cluster.local.kdl, .cluster.kdl, .cluster.local.kdl\n\
        - ./.clusterflow/ ディレクトリ\n\
        - ~/.config/clusterflow/cluster.kdl\n\
        または CFLOW_CONFIG_PATH 環境変数で直接指定できます"
    )]
    ClusterFileNotFound,

    #[error("無効な設定: {0}")]
    InvalidConfig(String),

    #[error("検証エラー: {path}\n理由: {message}")]
    ValidationError { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
