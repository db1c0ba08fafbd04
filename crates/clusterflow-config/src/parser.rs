//! KDLパーサー
//!
//! cluster.kdl をパースして [`ClusterConfig`] を生成します。
//! パース後に一度だけ検証を行い、以降の実行中に設定が曖昧なまま
//! 参照されることはありません。

use crate::error::{ConfigError, Result};
use crate::model::{
    Addon, AppsConfig, BackupDefaults, ClusterConfig, InfraConfig, Node, NodeRole,
};
use kdl::{KdlDocument, KdlNode};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// KDLファイルをパースしてClusterConfigを生成
pub fn parse_kdl_file<P: AsRef<Path>>(path: P) -> Result<ClusterConfig> {
    let content = fs::read_to_string(path.as_ref())?;
    let default_name = path
        .as_ref()
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    parse_kdl_string(&content, default_name)
}

/// KDL文字列をパース
pub fn parse_kdl_string(content: &str, default_name: String) -> Result<ClusterConfig> {
    let doc: KdlDocument = content.parse()?;

    let mut name = default_name;
    let mut kubeconfig = None;
    let mut pod_network_cidr = None;
    let mut nodes = Vec::new();
    let mut infra = None;
    let mut addons = BTreeMap::new();
    let mut apps = None;
    let mut backup = BackupDefaults::default();

    for node in doc.nodes() {
        match node.name().value() {
            "cluster" => {
                if let Some(cluster_name) = first_string(node) {
                    name = cluster_name;
                }
                if let Some(children) = node.children() {
                    kubeconfig = child_string(children, "kubeconfig").map(PathBuf::from);
                    pod_network_cidr = child_string(children, "pod-network-cidr");
                }
            }
            "node" => {
                nodes.push(parse_node_def(node)?);
            }
            "infra" => {
                infra = Some(parse_infra(node)?);
            }
            "addon" => {
                let (addon_name, addon) = parse_addon(node)?;
                addons.insert(addon_name, addon);
            }
            "apps" => {
                apps = Some(parse_apps(node)?);
            }
            "backup" => {
                backup = parse_backup(node);
            }
            _ => {
                // 不明なノードはスキップ（将来の拡張を許容）
            }
        }
    }

    let config = ClusterConfig {
        name,
        kubeconfig,
        pod_network_cidr,
        nodes,
        infra,
        addons,
        apps,
        backup,
    };

    validate(&config)?;
    Ok(config)
}

/// node ノードをパース
fn parse_node_def(node: &KdlNode) -> Result<Node> {
    let name = first_string(node)
        .ok_or_else(|| ConfigError::InvalidConfig("node には名前が必要です".to_string()))?;

    let children = node
        .children()
        .ok_or_else(|| ConfigError::InvalidConfig(format!("node \"{}\" に設定がありません", name)))?;

    let address = child_string(children, "address").ok_or_else(|| {
        ConfigError::InvalidConfig(format!("node \"{}\" に address がありません", name))
    })?;

    let role = match child_string(children, "role").as_deref() {
        Some("control-plane") => NodeRole::ControlPlane,
        Some("worker") | None => NodeRole::Worker,
        Some(other) => {
            return Err(ConfigError::InvalidConfig(format!(
                "node \"{}\" の role \"{}\" は不明です (control-plane | worker)",
                name, other
            )))
        }
    };

    let user = child_string(children, "user").unwrap_or_else(|| "root".to_string());
    let port = child_integer(children, "port").unwrap_or(22) as u16;

    Ok(Node {
        name,
        address,
        role,
        user,
        port,
    })
}

/// addon ノードをパース
fn parse_addon(node: &KdlNode) -> Result<(String, Addon)> {
    let name = first_string(node)
        .ok_or_else(|| ConfigError::InvalidConfig("addon には名前が必要です".to_string()))?;

    let children = node.children().ok_or_else(|| {
        ConfigError::InvalidConfig(format!("addon \"{}\" に設定がありません", name))
    })?;

    let chart = child_string(children, "chart").ok_or_else(|| {
        ConfigError::InvalidConfig(format!("addon \"{}\" に chart がありません", name))
    })?;

    let namespace = child_string(children, "namespace").ok_or_else(|| {
        ConfigError::InvalidConfig(format!("addon \"{}\" に namespace がありません", name))
    })?;

    let addon = Addon {
        chart,
        version: child_string(children, "version"),
        namespace,
        repo: child_string(children, "repo"),
        values: child_string(children, "values").map(PathBuf::from),
        enabled: child_bool(children, "enabled").unwrap_or(true),
    };

    Ok((name, addon))
}

fn parse_infra(node: &KdlNode) -> Result<InfraConfig> {
    let children = node
        .children()
        .ok_or_else(|| ConfigError::InvalidConfig("infra に設定がありません".to_string()))?;

    let dir = child_string(children, "dir")
        .ok_or_else(|| ConfigError::InvalidConfig("infra に dir がありません".to_string()))?;

    Ok(InfraConfig {
        dir: PathBuf::from(dir),
    })
}

fn parse_apps(node: &KdlNode) -> Result<AppsConfig> {
    let children = node
        .children()
        .ok_or_else(|| ConfigError::InvalidConfig("apps に設定がありません".to_string()))?;

    let manifests = child_string(children, "manifests")
        .ok_or_else(|| ConfigError::InvalidConfig("apps に manifests がありません".to_string()))?;

    Ok(AppsConfig {
        manifests: PathBuf::from(manifests),
    })
}

fn parse_backup(node: &KdlNode) -> BackupDefaults {
    let mut backup = BackupDefaults::default();

    if let Some(children) = node.children() {
        if let Some(output) = child_string(children, "output") {
            backup.output = PathBuf::from(output);
        }
        if let Some(archive) = child_bool(children, "archive") {
            backup.archive = archive;
        }
    }

    backup
}

/// パース後の一括検証
fn validate(config: &ClusterConfig) -> Result<()> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "クラスタ名が空です".to_string(),
        ));
    }

    if config.nodes.is_empty() {
        return Err(ConfigError::InvalidConfig(
            "node が1つも定義されていません".to_string(),
        ));
    }

    if config.control_plane().is_none() {
        return Err(ConfigError::InvalidConfig(
            "control-plane ロールの node が必要です".to_string(),
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for node in &config.nodes {
        if node.address.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(format!(
                "node \"{}\" の address が空です",
                node.name
            )));
        }
        if !seen.insert(node.name.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "node 名 \"{}\" が重複しています",
                node.name
            )));
        }
    }

    Ok(())
}

fn first_string(node: &KdlNode) -> Option<String> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn child_node<'a>(children: &'a KdlDocument, name: &str) -> Option<&'a KdlNode> {
    children.nodes().iter().find(|n| n.name().value() == name)
}

fn child_string(children: &KdlDocument, name: &str) -> Option<String> {
    child_node(children, name).and_then(first_string)
}

fn child_integer(children: &KdlDocument, name: &str) -> Option<i128> {
    child_node(children, name)
        .and_then(|n| n.entries().first())
        .and_then(|e| e.value().as_integer())
}

fn child_bool(children: &KdlDocument, name: &str) -> Option<bool> {
    child_node(children, name)
        .and_then(|n| n.entries().first())
        .and_then(|e| e.value().as_bool())
}
