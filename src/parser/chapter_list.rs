//! Chapter name translations from `chapters?language=..`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{ParseError, read_fragment};
use crate::cache::CacheStore;
use crate::catalog::{Language, chapter_list_file};

/// Transliterated and translated name of one chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterName {
    /// Latin transliteration (`Al-Fatihah`).
    pub transliteration: String,
    /// Name in the target language (`The Opener`).
    pub translation: String,
}

/// Chapter number → names, for one language.
pub type ChapterListRecord = BTreeMap<u16, ChapterName>;

#[derive(Debug, Deserialize)]
struct ChaptersResponse {
    #[serde(default)]
    chapters: Vec<Chapter>,
}

#[derive(Debug, Deserialize)]
struct Chapter {
    id: u16,
    name_simple: String,
    translated_name: TranslatedName,
}

#[derive(Debug, Deserialize)]
struct TranslatedName {
    #[serde(default)]
    language_name: String,
    #[serde(default)]
    name: String,
}

/// Parses the cached chapter list for `lang`.
///
/// Entries upstream served in another language are dropped, so a language
/// upstream does not carry yields an empty record.
///
/// # Errors
///
/// Returns [`ParseError`] if the cache entry exists but cannot be read or decoded.
#[instrument(skip(store), fields(lang = %lang))]
pub fn parse_chapter_list(
    store: &CacheStore,
    lang: Language,
) -> Result<ChapterListRecord, ParseError> {
    let file_name = chapter_list_file(lang.code);
    let Some(response) = read_fragment::<ChaptersResponse>(store, &file_name)? else {
        debug!(%file_name, "chapter list not cached");
        return Ok(ChapterListRecord::new());
    };

    let record: ChapterListRecord = response
        .chapters
        .into_iter()
        .filter(|chapter| lang.matches_upstream_name(&chapter.translated_name.language_name))
        .map(|chapter| {
            (
                chapter.id,
                ChapterName {
                    transliteration: chapter.name_simple,
                    translation: chapter.translated_name.name,
                },
            )
        })
        .collect();

    debug!(chapters = record.len(), "parsed chapter list");
    Ok(record)
}
