//! Parsers folding cached upstream fragments into normalized records.
//!
//! There is one state-free parser per [`crate::catalog::DataKind`]. Each one
//! locates its cache entries with the same file-name scheme the catalog uses,
//! decodes them, and folds them into a `BTreeMap` keyed by the natural key
//! (chapter number or [`WordKey`]), so record order never depends on fetch
//! order.
//!
//! # Behavior
//!
//! - A missing cache entry is skipped; a language with no entries yields an
//!   empty record
//! - Entries that upstream answered in a fallback language are treated as
//!   missing
//! - A present but malformed entry is a [`ParseError`]
//!
//! # Example
//!
//! ```no_run
//! use qurancom_core::cache::CacheStore;
//! use qurancom_core::catalog::{Catalog, Language};
//! use qurancom_core::parser::parse_chapter_list;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CacheStore::open("./.cache/qurancom")?;
//! let english = Language::from_code("en").ok_or("unsupported")?;
//! let record = parse_chapter_list(&store, english)?;
//! println!("{} chapters", record.len());
//! # Ok(())
//! # }
//! ```

mod chapter_info;
mod chapter_list;
mod error;
mod verses;
mod word_text;
mod word_translation;

pub use chapter_info::{ChapterInfo, ChapterInfoRecord, parse_chapter_info};
pub use chapter_list::{ChapterListRecord, ChapterName, parse_chapter_list};
pub use error::ParseError;
pub use word_text::{WordTextRecord, parse_word_texts};
pub use word_translation::{WordTranslationRecord, parse_word_translations};

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};

use crate::cache::CacheStore;

/// Position of one word: chapter, verse, and position within the verse.
///
/// Orders numerically (`1:2:10` after `1:2:9`) and serializes as the string
/// `chapter:verse:position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WordKey {
    /// Chapter number (1-based).
    pub chapter: u16,
    /// Verse number within the chapter (1-based).
    pub verse: u16,
    /// Word position within the verse (1-based).
    pub position: u16,
}

impl WordKey {
    /// Builds a key from an upstream `verse_key` (`"2:255"`) and a word position.
    ///
    /// Returns `None` if the verse key is not two positive integers joined by `:`.
    ///
    /// # Examples
    ///
    /// ```
    /// use qurancom_core::parser::WordKey;
    ///
    /// let key = WordKey::from_verse_key("2:255", 3).unwrap();
    /// assert_eq!(key.to_string(), "2:255:3");
    /// assert!(WordKey::from_verse_key("2-255", 3).is_none());
    /// ```
    #[must_use]
    pub fn from_verse_key(verse_key: &str, position: u16) -> Option<Self> {
        let (chapter, verse) = verse_key.split_once(':')?;
        let chapter = chapter.trim().parse::<u16>().ok().filter(|n| *n > 0)?;
        let verse = verse.trim().parse::<u16>().ok().filter(|n| *n > 0)?;
        Some(Self {
            chapter,
            verse,
            position,
        })
    }
}

impl fmt::Display for WordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.chapter, self.verse, self.position)
    }
}

impl Serialize for WordKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Reads and decodes one cache entry, or `None` if it is absent.
fn read_fragment<T: DeserializeOwned>(
    store: &CacheStore,
    file_name: &str,
) -> Result<Option<T>, ParseError> {
    let Some(bytes) = store
        .read(file_name)
        .map_err(|e| ParseError::read(file_name, e))?
    else {
        return Ok(None);
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| ParseError::json(file_name, e))
}
