use std::path::PathBuf;
use thiserror::Error;

/// Run-level failures of the statement pipeline.
///
/// Row-level problems are never represented here; they are absorbed into
/// `models::RunDiagnostics` and the run still succeeds with a partial
/// result set. Everything in this enum aborts the run it occurs in.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unreadable source {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("account reference query failed: {0}")]
    Reference(String),

    #[error("snapshot write failed: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, ParseError>;
