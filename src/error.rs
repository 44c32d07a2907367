//! Error taxonomy for the watcher core.
//!
//! Per-file extraction problems never surface here: they are folded into
//! [`ExtractionSummary::Failed`](crate::models::ExtractionSummary::Failed)
//! and the pass continues. What remains are pass-level failures (the root
//! vanished, the walk broke) and persistence failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    /// The watched root does not exist. Fatal when raised by `start()`.
    #[error("watched root does not exist: {}", .0.display())]
    RootMissing(PathBuf),

    /// The watched root exists but is not a directory. Fatal when raised by `start()`.
    #[error("watched root is not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("state file {} is not valid: {source}", .path.display())]
    StateFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid exclude glob: {0}")]
    Glob(#[from] globset::Error),
}

impl WatchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WatchError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that make the watcher refuse to start at all.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WatchError::RootMissing(_) | WatchError::RootNotDirectory(_) | WatchError::Glob(_)
        )
    }
}
