#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;

mod common;
use common::{TestProject, MINIMAL_TOPOLOGY};

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("cflow").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("rebuild"))
        .stdout(predicate::str::contains("teardown"))
        .stdout(predicate::str::contains("backup"))
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("node-prepare"));
}

/// バージョン表示が正しく動作することを確認
#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("cflow").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("clusterflow"));
}

/// 引数エラーは終了コード2 (clapのデフォルト)
#[test]
fn test_unknown_subcommand_exits_2() {
    let mut cmd = Command::cargo_bin("cflow").unwrap();
    cmd.arg("explode").assert().code(2);
}

#[test]
fn test_node_prepare_requires_target_version() {
    let mut cmd = Command::cargo_bin("cflow").unwrap();
    cmd.arg("node-prepare").assert().code(2);
}

/// 設定ファイルなしでは実行系コマンドは失敗する
#[test]
fn test_rebuild_without_config_fails() {
    let project = TestProject::new();

    let mut cmd = Command::cargo_bin("cflow").unwrap();
    cmd.current_dir(project.path())
        .arg("rebuild")
        .arg("--dry-run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("設定ファイルが見つかりません"));
}

/// validate: 正常な設定
#[test]
fn test_validate_ok() {
    let project = TestProject::new();
    project.write_cluster_kdl(MINIMAL_TOPOLOGY);

    let mut cmd = Command::cargo_bin("cflow").unwrap();
    cmd.current_dir(project.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("testlab"))
        .stdout(predicate::str::contains("cp-1"));
}

/// validate: control-plane のないトポロジーは拒否
#[test]
fn test_validate_rejects_missing_control_plane() {
    let project = TestProject::new();
    project.write_cluster_kdl(
        r#"
cluster "broken"

node "w-1" {
    address "127.0.0.1"
    role "worker"
}
"#,
    );

    let mut cmd = Command::cargo_bin("cflow").unwrap();
    cmd.current_dir(project.path())
        .arg("validate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("設定エラー"));
}

/// dry-run は外部ツールなしでも完走し、全フェーズが simulated になる
///
/// probe は kubectl 不在で「状態不明」に落ち、dry-run が実行を
/// スキップするため、変更は一切発生しない。
#[test]
fn test_rebuild_dry_run_simulates_all_phases() {
    let project = TestProject::new();
    project.write_cluster_kdl(MINIMAL_TOPOLOGY);

    let mut cmd = Command::cargo_bin("cflow").unwrap();
    cmd.current_dir(project.path())
        .arg("rebuild")
        .arg("--dry-run")
        .timeout(std::time::Duration::from_secs(120))
        .assert()
        .success()
        .stdout(predicate::str::contains("SKIPPED (simulated)"))
        .stdout(predicate::str::contains("clean"));
}

/// 確認ゲートで辞退すると終了コード0のまま中断される
#[test]
fn test_teardown_decline_is_clean_exit() {
    let project = TestProject::new();
    project.write_cluster_kdl(MINIMAL_TOPOLOGY);

    let mut cmd = Command::cargo_bin("cflow").unwrap();
    cmd.current_dir(project.path())
        .arg("teardown")
        .arg("--skip-backup")
        .write_stdin("no\n")
        .timeout(std::time::Duration::from_secs(120))
        .assert()
        .success()
        .stdout(predicate::str::contains("aborted"));
}

/// dry-run の teardown は確認ゲートを一切通らない
#[test]
fn test_teardown_dry_run_never_prompts() {
    let project = TestProject::new();
    project.write_cluster_kdl(MINIMAL_TOPOLOGY);

    let mut cmd = Command::cargo_bin("cflow").unwrap();
    // stdin を閉じたまま実行しても、dry-run ならプロンプトで
    // ブロックせずに完走する
    cmd.current_dir(project.path())
        .arg("teardown")
        .arg("--skip-backup")
        .arg("--dry-run")
        .timeout(std::time::Duration::from_secs(120))
        .assert()
        .success()
        .stdout(predicate::str::contains("SKIPPED (simulated)"));
}
