use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn write_cluster_kdl(&self, content: &str) {
        let path = self.root.path().join("cluster.kdl");
        fs::write(path, content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }
}

/// kubectl 等の外部ツールなしでもフェーズ構築まで通る最小トポロジー
pub const MINIMAL_TOPOLOGY: &str = r#"
cluster "testlab"

node "cp-1" {
    address "127.0.0.1"
    role "control-plane"
}
"#;
