//! Word-by-word translations from `verses/by_page/{p}?language=..`.

use std::collections::BTreeMap;

use tracing::{debug, instrument};

use super::verses::VersesPage;
use super::{ParseError, WordKey, read_fragment};
use crate::cache::CacheStore;
use crate::catalog::{Catalog, Language, word_translation_file};

/// Word key → translated text, for one language.
pub type WordTranslationRecord = BTreeMap<WordKey, String>;

/// Parses every cached word translation page of `catalog` for `lang`.
///
/// Only word tokens are kept. Tokens with an empty translation, or one that
/// upstream served in another language, are skipped.
///
/// # Errors
///
/// Returns [`ParseError`] on the first present page that cannot be read,
/// decoded, or carries a malformed verse key.
#[instrument(skip(store, catalog), fields(lang = %lang, pages = catalog.page_count()))]
pub fn parse_word_translations(
    store: &CacheStore,
    catalog: &Catalog,
    lang: Language,
) -> Result<WordTranslationRecord, ParseError> {
    let mut record = WordTranslationRecord::new();

    for page in 1..=catalog.page_count() {
        let file_name = word_translation_file(lang.code, page);
        let Some(fragment) = read_fragment::<VersesPage>(store, &file_name)? else {
            continue;
        };

        for (key, word) in fragment.words(&file_name)? {
            let Some(translation) = &word.translation else {
                continue;
            };
            let Some(text) = translation.text.as_deref().filter(|t| !t.trim().is_empty()) else {
                continue;
            };
            let same_language = translation
                .language_name
                .as_deref()
                .is_some_and(|name| lang.matches_upstream_name(name));
            if same_language {
                record.insert(key, text.to_string());
            }
        }
    }

    debug!(words = record.len(), "parsed word translations");
    Ok(record)
}
