//! Uthmani word text, shared by every language.

use std::collections::BTreeMap;

use tracing::{debug, instrument, warn};

use super::verses::VersesPage;
use super::{ParseError, WordKey, read_fragment};
use crate::cache::CacheStore;
use crate::catalog::{Catalog, EXPECTED_WORD_COUNT, word_text_file};

/// Word key → Uthmani text.
pub type WordTextRecord = BTreeMap<WordKey, String>;

/// Parses every cached word text page of `catalog`.
///
/// When the catalog spans every page, a word count other than
/// [`EXPECTED_WORD_COUNT`] is logged as a warning; the record is still returned.
///
/// # Errors
///
/// Returns [`ParseError`] on the first present page that cannot be read,
/// decoded, or carries a malformed verse key.
#[instrument(skip_all, fields(pages = catalog.page_count()))]
pub fn parse_word_texts(
    store: &CacheStore,
    catalog: &Catalog,
) -> Result<WordTextRecord, ParseError> {
    let mut record = WordTextRecord::new();
    let mut missing_pages = 0usize;

    for page in 1..=catalog.page_count() {
        let file_name = word_text_file(page);
        let Some(fragment) = read_fragment::<VersesPage>(store, &file_name)? else {
            missing_pages += 1;
            continue;
        };
        for (key, word) in fragment.words(&file_name)? {
            if let Some(text) = word.text_uthmani.as_deref().filter(|t| !t.is_empty()) {
                record.insert(key, text.to_string());
            }
        }
    }

    if catalog.covers_all_pages() && missing_pages == 0 && record.len() != EXPECTED_WORD_COUNT {
        warn!(
            words = record.len(),
            expected = EXPECTED_WORD_COUNT,
            "word count differs from expected, upstream data may have changed"
        );
    }

    debug!(words = record.len(), missing_pages, "parsed word texts");
    Ok(record)
}
