//! Aggregator/writers: one consolidated JSON artifact per (kind, language).
//!
//! Artifacts are pretty-printed JSON with keys in natural order and a
//! trailing newline, written with the same temp-then-rename discipline as the
//! cache so a reader never sees half an artifact.
//!
//! | Kind | Artifact |
//! |------|----------|
//! | chapter list | `{dst}/surah-translation/{code}.json` |
//! | chapter info | `{dst}/surah-info/{code}.json` |
//! | word translation | `{dst}/word-translation/{code}.json` |
//! | word text | `{dst}/word-text.json` |

mod error;

pub use error::WriteError;

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::cache::write_atomic;
use crate::catalog::{Catalog, DataKind, Language};

/// Per-language records handed to a writer; only languages with data.
pub type LanguageRecords<R> = BTreeMap<Language, R>;

/// File name of the language-independent word text artifact.
const WORD_TEXT_ARTIFACT: &str = "word-text.json";

/// Directory holding the per-language artifacts of `kind`.
///
/// Returns `None` for [`DataKind::WordText`], whose artifact is a single file.
#[must_use]
pub fn artifact_dir(kind: DataKind) -> Option<&'static str> {
    match kind {
        DataKind::ChapterList => Some("surah-translation"),
        DataKind::ChapterInfo => Some("surah-info"),
        DataKind::WordTranslation => Some("word-translation"),
        DataKind::WordText => None,
    }
}

/// Path of the artifact for `kind` and `lang` under `dst`.
///
/// `lang` is ignored for [`DataKind::WordText`].
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use qurancom_core::catalog::{DataKind, Language};
/// use qurancom_core::writer::artifact_path;
///
/// let en = Language::from_code("en").unwrap();
/// assert_eq!(
///     artifact_path(Path::new("out"), DataKind::ChapterInfo, en),
///     Path::new("out/surah-info/en.json")
/// );
/// assert_eq!(
///     artifact_path(Path::new("out"), DataKind::WordText, en),
///     Path::new("out/word-text.json")
/// );
/// ```
#[must_use]
pub fn artifact_path(dst: &Path, kind: DataKind, lang: Language) -> PathBuf {
    match artifact_dir(kind) {
        Some(dir) => dst.join(dir).join(format!("{}.json", lang.code)),
        None => dst.join(WORD_TEXT_ARTIFACT),
    }
}

/// Removes the artifacts `catalog` is responsible for under `dst`.
///
/// Each language of the catalog loses its per-kind artifact, and the shared
/// word text file is removed. Artifacts of languages outside the catalog,
/// the cache, and anything else under `dst` survive.
///
/// # Errors
///
/// Returns [`WriteError::Io`] if an existing artifact cannot be removed.
#[instrument(level = "debug", skip_all, fields(dst = %dst.display()))]
pub fn clean_output(dst: &Path, catalog: &Catalog) -> Result<(), WriteError> {
    for kind in DataKind::ALL {
        let languages = match kind {
            DataKind::ChapterList | DataKind::ChapterInfo => catalog.languages(),
            DataKind::WordTranslation => catalog.word_languages(),
            DataKind::WordText => {
                remove(&dst.join(WORD_TEXT_ARTIFACT))?;
                continue;
            }
        };
        for &lang in languages {
            remove(&artifact_path(dst, kind, lang))?;
        }
    }
    debug!("output cleaned");
    Ok(())
}

fn remove(path: &Path) -> Result<(), WriteError> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed stale artifact");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(WriteError::io(path, e)),
    }
}

/// Writes one artifact per language for `kind`, in language order.
///
/// Returns the written paths.
///
/// # Errors
///
/// Returns [`WriteError`] on the first artifact that fails; artifacts written
/// before it stay on disk.
#[instrument(skip_all, fields(kind = %kind, languages = records.len()))]
pub fn write_language_artifacts<R: Serialize>(
    dst: &Path,
    kind: DataKind,
    records: &LanguageRecords<R>,
) -> Result<Vec<PathBuf>, WriteError> {
    let mut written = Vec::with_capacity(records.len());
    for (lang, record) in records {
        let path = artifact_path(dst, kind, *lang);
        write_json(&path, record)?;
        written.push(path);
    }
    info!(artifacts = written.len(), "artifacts written");
    Ok(written)
}

/// Writes the shared word text artifact, unless `record` is empty.
///
/// # Errors
///
/// Returns [`WriteError`] if encoding or writing fails.
#[instrument(skip_all, fields(words = record.len()))]
pub fn write_word_text_artifact<K: Serialize, V: Serialize>(
    dst: &Path,
    record: &BTreeMap<K, V>,
) -> Result<Option<PathBuf>, WriteError> {
    if record.is_empty() {
        debug!("no word text parsed, skipping artifact");
        return Ok(None);
    }
    let path = dst.join(WORD_TEXT_ARTIFACT);
    write_json(&path, record)?;
    info!(path = %path.display(), "word text artifact written");
    Ok(Some(path))
}

/// Encodes `value` as pretty JSON with a trailing newline and writes it atomically.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), WriteError> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|e| WriteError::serialize(path, e))?;
    bytes.push(b'\n');

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| WriteError::io(parent, e))?;
    }
    write_atomic(path, &bytes).map_err(|e| WriteError::io(path, e))?;
    debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
    Ok(())
}
