pub mod error;
pub mod model;
pub mod parser;

pub use error::*;
pub use model::*;
pub use parser::{parse_kdl_file, parse_kdl_string};

use std::path::PathBuf;

/// ClusterFlowの設定ディレクトリを取得
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("clusterflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// プロジェクトのcluster.kdlファイルを探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 CFLOW_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: cluster.local.kdl, .cluster.local.kdl, cluster.kdl, .cluster.kdl
/// 3. ./.clusterflow/ ディレクトリ内: 同様の順序
/// 4. ~/.config/clusterflow/cluster.kdl (グローバル設定)
pub fn find_cluster_file() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var("CFLOW_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    let candidates = [
        "cluster.local.kdl",
        ".cluster.local.kdl",
        "cluster.kdl",
        ".cluster.kdl",
    ];

    // 2. カレントディレクトリで検索
    for filename in &candidates {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    // 3. ./.clusterflow/ ディレクトリで検索
    let flow_dir = current_dir.join(".clusterflow");
    if flow_dir.is_dir() {
        for filename in &candidates {
            let path = flow_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    // 4. グローバル設定ファイル (~/.config/clusterflow/cluster.kdl)
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("clusterflow").join("cluster.kdl");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    // どの設定ファイルも見つからなかった
    Err(ConfigError::ClusterFileNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_get_config_dir() {
        let result = get_config_dir();
        assert!(result.is_ok());

        let config_dir = result.unwrap();
        assert!(config_dir.ends_with("clusterflow"));
        assert!(config_dir.exists());
    }

    #[test]
    #[serial]
    fn test_find_cluster_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("cluster.kdl"), "// test").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_cluster_file();

        std::env::set_current_dir(&original_dir).unwrap();

        assert!(result.is_ok());
        assert!(result.unwrap().ends_with("cluster.kdl"));
    }

    #[test]
    #[serial]
    fn test_local_overrides_shared() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("cluster.kdl"), "// shared").unwrap();
        fs::write(temp_dir.path().join("cluster.local.kdl"), "// local").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_cluster_file();

        std::env::set_current_dir(&original_dir).unwrap();

        assert!(result.unwrap().ends_with("cluster.local.kdl"));
    }

    #[test]
    #[serial]
    fn test_env_var_override() {
        let temp_dir = tempfile::tempdir().unwrap();
        let custom = temp_dir.path().join("anywhere.kdl");
        fs::write(&custom, "// custom").unwrap();

        temp_env::with_var("CFLOW_CONFIG_PATH", Some(custom.to_str().unwrap()), || {
            let result = find_cluster_file();
            assert_eq!(result.unwrap(), custom);
        });
    }
}
