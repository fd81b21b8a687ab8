//! On-disk cache of raw upstream documents.
//!
//! Each cached document lives at `<cache_dir>/<file_name>`. Existence implies
//! validity: there is no TTL or checksum, the only invalidation is
//! [`CacheStore::clear`]. Writes go through [`write_atomic`], which writes a
//! uniquely named temporary file in the same directory and renames it over the
//! target, so readers observe either no file or a complete one.
//!
//! There is no cross-process locking. Two runs sharing a cache directory may
//! both fetch the same document; the last rename wins and both copies are
//! complete.

mod error;

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

pub use error::CacheError;

/// Prefix of in-flight temporary files; never a valid cache key.
const TEMP_PREFIX: &str = ".tmp-";

/// Filename-addressed store of fetched documents.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Opens the store at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory cannot be created.
    #[instrument(level = "debug", skip(dir), fields(dir = %dir.as_ref().display()))]
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CacheError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Returns a handle to `dir` without touching the filesystem.
    #[must_use]
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the entry for `file_name`.
    #[must_use]
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Returns whether a complete entry for `file_name` is present.
    ///
    /// Zero-length files are reported as missing.
    #[must_use]
    pub fn exists(&self, file_name: &str) -> bool {
        fs::metadata(self.path(file_name)).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
    }

    /// Reads the entry for `file_name`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] for any failure other than the file not existing.
    pub fn read(&self, file_name: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path(file_name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    /// Atomically stores `bytes` as the entry for `file_name`.
    ///
    /// Safe to call concurrently, including for the same name.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidName`] if `file_name` is not a plain file
    /// name, or [`CacheError::Io`] if writing fails. A failed write leaves no
    /// entry behind.
    #[instrument(level = "debug", skip(self, bytes), fields(bytes = bytes.len()))]
    pub fn persist(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, CacheError> {
        validate_file_name(file_name)?;
        let path = self.path(file_name);
        write_atomic(&path, bytes).map_err(|e| CacheError::io(&path, e))?;
        debug!(path = %path.display(), "cache entry persisted");
        Ok(path)
    }

    /// Deletes every entry and recreates an empty cache directory.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if removal or re-creation fails.
    #[instrument(level = "debug", skip(self), fields(dir = %self.dir.display()))]
    pub fn clear(&self) -> Result<(), CacheError> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => info!(dir = %self.dir.display(), "cache cleared"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::io(&self.dir, e)),
        }
        fs::create_dir_all(&self.dir).map_err(|e| CacheError::io(&self.dir, e))
    }
}

fn validate_file_name(file_name: &str) -> Result<(), CacheError> {
    let plain = !file_name.is_empty()
        && !file_name.starts_with('.')
        && !file_name.contains(['/', '\\'])
        && Path::new(file_name).file_name().is_some_and(|name| name == file_name);
    if plain {
        Ok(())
    } else {
        Err(CacheError::invalid_name(file_name))
    }
}

/// Writes `bytes` to `path` via a temporary sibling file and a rename.
///
/// The temporary file is flushed and synced before the rename. On any error
/// the temporary file is removed and `path` is left untouched.
///
/// # Errors
///
/// Returns the underlying I/O error.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".part")
        .tempfile_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
