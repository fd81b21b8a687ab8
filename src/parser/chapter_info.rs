//! Per-chapter descriptions from `chapters/{n}/info?language=..`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{ParseError, read_fragment};
use crate::cache::CacheStore;
use crate::catalog::{Catalog, Language, chapter_info_file};

/// Descriptive text for one chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterInfo {
    /// One-paragraph summary.
    pub short_text: String,
    /// Attribution of the text.
    pub source: String,
    /// Full description (HTML).
    pub text: String,
}

/// Chapter number → info, for one language.
pub type ChapterInfoRecord = BTreeMap<u16, ChapterInfo>;

#[derive(Debug, Deserialize)]
struct ChapterInfoResponse {
    chapter_info: ChapterInfoPayload,
}

#[derive(Debug, Deserialize)]
struct ChapterInfoPayload {
    #[serde(default)]
    language_name: String,
    #[serde(default)]
    short_text: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    text: String,
}

/// Parses every cached chapter info entry of `catalog` for `lang`.
///
/// # Errors
///
/// Returns [`ParseError`] on the first present entry that cannot be read or decoded.
#[instrument(skip(store, catalog), fields(lang = %lang, chapters = catalog.chapter_count()))]
pub fn parse_chapter_info(
    store: &CacheStore,
    catalog: &Catalog,
    lang: Language,
) -> Result<ChapterInfoRecord, ParseError> {
    let mut record = ChapterInfoRecord::new();
    let mut fallback = 0usize;

    for chapter in 1..=catalog.chapter_count() {
        let file_name = chapter_info_file(lang.code, chapter);
        let Some(response) = read_fragment::<ChapterInfoResponse>(store, &file_name)? else {
            continue;
        };
        let info = response.chapter_info;
        if !lang.matches_upstream_name(&info.language_name) {
            fallback += 1;
            continue;
        }
        record.insert(
            chapter,
            ChapterInfo {
                short_text: info.short_text,
                source: info.source,
                text: info.text,
            },
        );
    }

    debug!(chapters = record.len(), fallback, "parsed chapter info");
    Ok(record)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn info_json(language_name: &str, short: &str) -> String {
        format!(
            r#"{{"chapter_info":{{"id":1,"chapter_id":1,"language_name":"{language_name}","short_text":"{short}","source":"src","text":"<p>t</p>"}}}}"#
        )
    }

    fn catalog() -> Catalog {
        Catalog::default().with_chapter_count(3)
    }

    #[test]
    fn test_parse_skips_missing_chapters() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::open(temp.path()).unwrap();
        store
            .persist("chapter-info-en-003.json", info_json("english", "third").as_bytes())
            .unwrap();
        store
            .persist("chapter-info-en-001.json", info_json("english", "first").as_bytes())
            .unwrap();

        let record = parse_chapter_info(&store, &catalog(), Language::from_code("en").unwrap())
            .unwrap();
        assert_eq!(record.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(record[&3].short_text, "third");
        assert_eq!(record[&1].source, "src");
    }

    #[test]
    fn test_fallback_language_yields_empty_record() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::open(temp.path()).unwrap();
        for n in 1..=3 {
            store
                .persist(&chapter_info_file("ko", n), info_json("english", "x").as_bytes())
                .unwrap();
        }
        let record =
            parse_chapter_info(&store, &catalog(), Language::from_code("ko").unwrap()).unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn test_malformed_entry_names_file() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::open(temp.path()).unwrap();
        store.persist("chapter-info-en-002.json", b"[]").unwrap();
        let err = parse_chapter_info(&store, &catalog(), Language::from_code("en").unwrap())
            .unwrap_err();
        assert_eq!(err.file_name(), "chapter-info-en-002.json");
    }
}
