//! Error types for loading row files.
//!
//! Validation findings are never errors. These variants cover the cases where
//! a row collection could not be read at all.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or locating row files.
#[derive(Error, Debug)]
pub enum CoreError {
    /// File system failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or directory that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a JSON array of row objects.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid glob pattern built from a directory path.
    #[error("invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl CoreError {
    /// Wrap an I/O error together with the path it concerns.
    #[inline]
    #[must_use = "returns the wrapped error"]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for `permit-core` operations.
pub type Result<T> = std::result::Result<T, CoreError>;
