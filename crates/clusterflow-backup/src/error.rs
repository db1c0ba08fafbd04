//! Backup engine error types
//!
//! Per-collection export failures are captured on the snapshot entry,
//! not raised through this type; only engine-level failures (output
//! directory, manifest, archive) abort a backup.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("output directory error: {0}")]
    OutputDir(String),

    #[error("manifest write failed: {0}")]
    Manifest(String),

    #[error("archive failed: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BackupError>;
