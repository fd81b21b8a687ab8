//! Error types for artifact writing.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while writing output artifacts.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Filesystem failure creating, replacing or removing an artifact.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        /// Artifact or directory path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The record could not be encoded as JSON.
    #[error("failed to encode {}: {source}", path.display())]
    Serialize {
        /// Artifact path.
        path: PathBuf,
        /// Encode error.
        #[source]
        source: serde_json::Error,
    },
}

impl WriteError {
    /// Creates an I/O error for `path`.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an encode error for `path`.
    #[must_use]
    pub fn serialize(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialize {
            path: path.into(),
            source,
        }
    }
}
