//! クラスタトポロジーモデル
//!
//! cluster.kdl で宣言されるクラスタ構成（ノード、アドオン、バックアップ設定など）の定義。
//! 起動時に一度だけ検証され、以降は不変の構造体としてオーケストレーターに渡されます。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// クラスタ設定のルート
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// クラスタ名
    pub name: String,

    /// kubeconfig のパス（未指定時は kubectl のデフォルト）
    pub kubeconfig: Option<PathBuf>,

    /// Pod ネットワーク CIDR（kubeadm init に渡す）
    pub pod_network_cidr: Option<String>,

    /// ノード一覧（宣言順を保持）
    pub nodes: Vec<Node>,

    /// IaC 設定
    pub infra: Option<InfraConfig>,

    /// アドオン定義（networking, storage, ingress, ...）
    pub addons: BTreeMap<String, Addon>,

    /// アプリケーションマニフェスト設定
    pub apps: Option<AppsConfig>,

    /// バックアップのデフォルト設定
    pub backup: BackupDefaults,
}

impl ClusterConfig {
    /// 最初のコントロールプレーンノード
    pub fn control_plane(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.role == NodeRole::ControlPlane)
    }

    /// コントロールプレーン以外のノード
    pub fn joining_nodes(&self) -> Vec<&Node> {
        let cp = self.control_plane().map(|n| n.name.as_str());
        self.nodes
            .iter()
            .filter(|n| Some(n.name.as_str()) != cp)
            .collect()
    }

    pub fn addon(&self, name: &str) -> Option<&Addon> {
        self.addons.get(name).filter(|a| a.enabled)
    }
}

/// ノード定義
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// ノード名（クラスタ内で一意）
    pub name: String,

    /// SSH 接続先アドレス
    pub address: String,

    /// ロール
    pub role: NodeRole,

    /// SSH ユーザー（デフォルト: root）
    pub user: String,

    /// SSH ポート
    pub port: u16,
}

impl Node {
    /// `user@address` 形式の SSH ターゲット
    pub fn ssh_target(&self) -> String {
        format!("{}@{}", self.user, self.address)
    }
}

/// ノードのロール
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    ControlPlane,
    Worker,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::ControlPlane => write!(f, "control-plane"),
            NodeRole::Worker => write!(f, "worker"),
        }
    }
}

/// IaC（OpenTofu）設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfraConfig {
    /// OpenTofu 作業ディレクトリ
    pub dir: PathBuf,
}

/// アドオン定義（Helm チャート単位）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Addon {
    /// チャート参照（例: cilium/cilium）
    pub chart: String,

    /// チャートバージョン（未指定時は最新）
    pub version: Option<String>,

    /// インストール先 namespace
    pub namespace: String,

    /// Helm リポジトリ URL
    pub repo: Option<String>,

    /// values ファイルのパス
    pub values: Option<PathBuf>,

    /// 無効化するには #false を指定
    pub enabled: bool,
}

/// アプリケーションマニフェスト設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppsConfig {
    /// kubectl apply -k に渡すディレクトリ
    pub manifests: PathBuf,
}

/// バックアップのデフォルト設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupDefaults {
    /// 出力先ディレクトリ
    pub output: PathBuf,

    /// 完了後に tar.gz へアーカイブするか
    pub archive: bool,
}

impl Default for BackupDefaults {
    fn default() -> Self {
        Self {
            output: PathBuf::from("backups"),
            archive: false,
        }
    }
}
