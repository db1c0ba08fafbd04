//! サブコマンド実装

pub mod backup;
pub mod node_prepare;
pub mod rebuild;
pub mod teardown;
pub mod validate;
pub mod verify;

use clusterflow_core::ExecutionContext;
use std::sync::atomic::Ordering;

/// Ctrl-C でコンテキストのキャンセルフラグを立てる
///
/// executor は実行中の外部呼び出しを完了させてから停止します。
pub fn install_ctrl_c(ctx: &ExecutionContext) {
    let flag = ctx.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            eprintln!("中断要求を受け付けました。実行中のフェーズ完了後に停止します...");
            flag.store(true, Ordering::SeqCst);
        }
    });
}
