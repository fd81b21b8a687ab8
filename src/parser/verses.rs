//! Upstream `verses/by_page` payload shared by the word parsers.

use serde::Deserialize;

use super::{ParseError, WordKey};

/// Token type upstream uses for actual words (as opposed to verse-end markers).
const WORD_CHAR_TYPE: &str = "word";

#[derive(Debug, Deserialize)]
pub(super) struct VersesPage {
    #[serde(default)]
    pub verses: Vec<Verse>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Verse {
    pub verse_key: String,
    #[serde(default)]
    pub words: Vec<Word>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Word {
    pub position: u16,
    #[serde(default)]
    pub char_type_name: Option<String>,
    #[serde(default)]
    pub text_uthmani: Option<String>,
    #[serde(default)]
    pub translation: Option<WordTranslation>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WordTranslation {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub language_name: Option<String>,
}

impl VersesPage {
    /// Yields `(key, word)` for every word token on the page.
    ///
    /// Fails on the first verse with a malformed key, whether or not it
    /// carries any word tokens.
    pub fn words(&self, file_name: &str) -> Result<Vec<(WordKey, &Word)>, ParseError> {
        let mut words = Vec::new();
        for verse in &self.verses {
            let verse_key = WordKey::from_verse_key(&verse.verse_key, 0)
                .ok_or_else(|| ParseError::invalid_key(file_name, &verse.verse_key))?;
            for word in &verse.words {
                if word.char_type_name.as_deref() != Some(WORD_CHAR_TYPE) {
                    continue;
                }
                let key = WordKey {
                    position: word.position,
                    ..verse_key
                };
                words.push((key, word));
            }
        }
        Ok(words)
    }
}
