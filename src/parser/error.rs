//! Error types for cached fragment parsing.

use thiserror::Error;

use crate::cache::CacheError;

/// Errors that can occur while folding cached fragments into records.
///
/// Every variant names the cache file so the user knows which entry to
/// delete (or to rerun with `--clear-cache`).
#[derive(Debug, Error)]
pub enum ParseError {
    /// The cache entry exists but could not be read.
    #[error("failed to read cached {file_name}: {source}")]
    Read {
        /// Cache file name.
        file_name: String,
        /// Underlying cache error.
        #[source]
        source: CacheError,
    },

    /// The cache entry is not the JSON document expected for its kind.
    #[error(
        "malformed cached {file_name}: {source}\n  Suggestion: rerun with --clear-cache to refetch"
    )]
    Json {
        /// Cache file name.
        file_name: String,
        /// Decode error.
        #[source]
        source: serde_json::Error,
    },

    /// A verse key in the fragment is not `chapter:verse`.
    #[error("invalid verse key '{key}' in cached {file_name}")]
    InvalidKey {
        /// Cache file name.
        file_name: String,
        /// The offending key.
        key: String,
    },
}

impl ParseError {
    /// Creates a read error for `file_name`.
    #[must_use]
    pub fn read(file_name: impl Into<String>, source: CacheError) -> Self {
        Self::Read {
            file_name: file_name.into(),
            source,
        }
    }

    /// Creates a JSON decode error for `file_name`.
    #[must_use]
    pub fn json(file_name: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            file_name: file_name.into(),
            source,
        }
    }

    /// Creates an invalid-key error.
    #[must_use]
    pub fn invalid_key(file_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self::InvalidKey {
            file_name: file_name.into(),
            key: key.into(),
        }
    }

    /// Cache file the error refers to.
    #[must_use]
    pub fn file_name(&self) -> &str {
        match self {
            Self::Read { file_name, .. }
            | Self::Json { file_name, .. }
            | Self::InvalidKey { file_name, .. } => file_name,
        }
    }
}
