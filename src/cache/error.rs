//! Error types for the cache store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by [`super::CacheStore`].
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure on a cache path.
    #[error("cache IO error at {path}: {source}")]
    Io {
        /// Path being read, written or removed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The key is not a plain file name inside the cache directory.
    #[error("invalid cache file name '{file_name}'")]
    InvalidName {
        /// The rejected name.
        file_name: String,
    },
}

impl CacheError {
    /// Creates an IO error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid-name error.
    pub fn invalid_name(file_name: impl Into<String>) -> Self {
        Self::InvalidName {
            file_name: file_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display_includes_path() {
        let error = CacheError::io(
            "/tmp/cache/a.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = error.to_string();
        assert!(msg.contains("/tmp/cache/a.json"), "Expected path in: {msg}");
        assert!(msg.contains("denied"), "Expected cause in: {msg}");
    }

    #[test]
    fn test_invalid_name_display() {
        let msg = CacheError::invalid_name("../x").to_string();
        assert!(msg.contains("../x"), "Expected name in: {msg}");
    }
}
