//! Static catalog of every resource the quran.com fetcher needs.
//!
//! The catalog is derived from the supported language tables and the fixed
//! mushaf dimensions (114 chapters, 604 pages). Every [`Resource`] carries the
//! URL to fetch and the cache filename it is stored under. The filename is the
//! cache key, so the naming scheme below must stay stable and collision-free:
//!
//! | Kind | Cache file |
//! |------|------------|
//! | [`DataKind::ChapterList`] | `chapters-{code}.json` |
//! | [`DataKind::ChapterInfo`] | `chapter-info-{code}-{nnn}.json` |
//! | [`DataKind::WordTranslation`] | `word-translation-{code}-{ppp}.json` |
//! | [`DataKind::WordText`] | `word-text-{ppp}.json` |
//!
//! # Example
//!
//! ```
//! use qurancom_core::catalog::{Catalog, DataKind};
//!
//! let catalog = Catalog::new("https://api.quran.com/api/v4")
//!     .with_chapter_count(2)
//!     .with_page_count(1);
//! let resources = catalog.resources();
//! assert!(resources.iter().any(|r| r.kind == DataKind::WordText));
//! ```

use std::fmt;

/// Default upstream API root.
pub const DEFAULT_API_URL: &str = "https://api.quran.com/api/v4";

/// Number of chapters (surahs).
pub const CHAPTER_COUNT: u16 = 114;

/// Number of pages in the Madani mushaf.
pub const PAGE_COUNT: u16 = 604;

/// Number of word tokens the full word-text dataset is expected to contain.
pub const EXPECTED_WORD_COUNT: usize = 77_429;

/// A language supported by the upstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Language {
    /// Request parameter and output file stem (`en`, `id`, ...).
    pub code: &'static str,
    /// Name reported by upstream in `language_name` fields.
    pub name: &'static str,
}

impl Language {
    /// Looks up a supported language by its code.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        LANGUAGES
            .iter()
            .copied()
            .find(|lang| lang.code.eq_ignore_ascii_case(code.trim()))
    }

    /// Returns whether `language_name` from an upstream payload belongs to this language.
    #[must_use]
    pub fn matches_upstream_name(&self, language_name: &str) -> bool {
        self.name.eq_ignore_ascii_case(language_name.trim())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

const fn lang(code: &'static str, name: &'static str) -> Language {
    Language { code, name }
}

/// Languages fetched for chapter names and chapter info.
pub const LANGUAGES: &[Language] = &[
    lang("bn", "bengali"),
    lang("bs", "bosnian"),
    lang("de", "german"),
    lang("en", "english"),
    lang("es", "spanish"),
    lang("fa", "persian"),
    lang("fr", "french"),
    lang("hi", "hindi"),
    lang("id", "indonesian"),
    lang("it", "italian"),
    lang("ja", "japanese"),
    lang("ko", "korean"),
    lang("ml", "malayalam"),
    lang("ms", "malay"),
    lang("nl", "dutch"),
    lang("pt", "portuguese"),
    lang("ru", "russian"),
    lang("sq", "albanian"),
    lang("sw", "swahili"),
    lang("ta", "tamil"),
    lang("th", "thai"),
    lang("tr", "turkish"),
    lang("ur", "urdu"),
    lang("zh", "chinese"),
];

/// Languages with word-by-word translations upstream.
pub const WORD_LANGUAGES: &[Language] = &[
    lang("bn", "bengali"),
    lang("en", "english"),
    lang("fa", "persian"),
    lang("hi", "hindi"),
    lang("id", "indonesian"),
    lang("ml", "malayalam"),
    lang("ta", "tamil"),
    lang("tr", "turkish"),
    lang("ur", "urdu"),
];

/// Category of fetched content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataKind {
    /// Translated chapter names, one document per language.
    ChapterList,
    /// Chapter introductions, one document per chapter and language.
    ChapterInfo,
    /// Word-by-word translations, one document per page and language.
    WordTranslation,
    /// Uthmani word text, one document per page, shared by all languages.
    WordText,
}

impl DataKind {
    /// All kinds in pipeline order.
    pub const ALL: [Self; 4] = [
        Self::ChapterList,
        Self::ChapterInfo,
        Self::WordTranslation,
        Self::WordText,
    ];

    /// Returns the stable label used in logs and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChapterList => "chapter-list",
            Self::ChapterInfo => "chapter-info",
            Self::WordTranslation => "word-translation",
            Self::WordText => "word-text",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One downloadable unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    /// Absolute URL to GET.
    pub url: String,
    /// Cache filename, unique within a catalog.
    pub file_name: String,
    /// Kind of data the document holds.
    pub kind: DataKind,
}

/// Cache filename of the chapter list for `code`.
#[must_use]
pub fn chapter_list_file(code: &str) -> String {
    format!("chapters-{code}.json")
}

/// Cache filename of one chapter's info for `code`.
#[must_use]
pub fn chapter_info_file(code: &str, chapter: u16) -> String {
    format!("chapter-info-{code}-{chapter:03}.json")
}

/// Cache filename of one page of word translations for `code`.
#[must_use]
pub fn word_translation_file(code: &str, page: u16) -> String {
    format!("word-translation-{code}-{page:03}.json")
}

/// Cache filename of one page of word text.
#[must_use]
pub fn word_text_file(page: u16) -> String {
    format!("word-text-{page:03}.json")
}

/// The full logical set of resources for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    api_url: String,
    languages: Vec<Language>,
    word_languages: Vec<Language>,
    chapter_count: u16,
    page_count: u16,
}

impl Catalog {
    /// Creates the full catalog against `api_url`.
    #[must_use]
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            languages: LANGUAGES.to_vec(),
            word_languages: WORD_LANGUAGES.to_vec(),
            chapter_count: CHAPTER_COUNT,
            page_count: PAGE_COUNT,
        }
    }

    /// Replaces the chapter-level language list.
    #[must_use]
    pub fn with_languages(mut self, languages: Vec<Language>) -> Self {
        self.languages = languages;
        self
    }

    /// Replaces the word-translation language list.
    #[must_use]
    pub fn with_word_languages(mut self, languages: Vec<Language>) -> Self {
        self.word_languages = languages;
        self
    }

    /// Keeps only languages whose code is in `codes`, for both language lists.
    #[must_use]
    pub fn retain_languages(mut self, codes: &[&str]) -> Self {
        let keep = |lang: &Language| codes.iter().any(|code| lang.code == *code);
        self.languages.retain(keep);
        self.word_languages.retain(keep);
        self
    }

    /// Overrides the number of chapters enumerated.
    #[must_use]
    pub fn with_chapter_count(mut self, chapter_count: u16) -> Self {
        self.chapter_count = chapter_count;
        self
    }

    /// Overrides the number of pages enumerated.
    #[must_use]
    pub fn with_page_count(mut self, page_count: u16) -> Self {
        self.page_count = page_count;
        self
    }

    /// Upstream API root without a trailing slash.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Chapter-level languages.
    #[must_use]
    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    /// Word-translation languages.
    #[must_use]
    pub fn word_languages(&self) -> &[Language] {
        &self.word_languages
    }

    /// Number of chapters enumerated.
    #[must_use]
    pub fn chapter_count(&self) -> u16 {
        self.chapter_count
    }

    /// Number of pages enumerated.
    #[must_use]
    pub fn page_count(&self) -> u16 {
        self.page_count
    }

    /// Whether the catalog covers the complete mushaf page range.
    #[must_use]
    pub fn covers_all_pages(&self) -> bool {
        self.page_count == PAGE_COUNT
    }

    /// Enumerates every resource, ordered by kind, language, then number.
    #[must_use]
    pub fn resources(&self) -> Vec<Resource> {
        let api = &self.api_url;
        let mut resources = Vec::new();

        for lang in &self.languages {
            resources.push(Resource {
                url: format!("{api}/chapters?language={}", lang.code),
                file_name: chapter_list_file(lang.code),
                kind: DataKind::ChapterList,
            });
        }

        for lang in &self.languages {
            for chapter in 1..=self.chapter_count {
                resources.push(Resource {
                    url: format!("{api}/chapters/{chapter}/info?language={}", lang.code),
                    file_name: chapter_info_file(lang.code, chapter),
                    kind: DataKind::ChapterInfo,
                });
            }
        }

        for lang in &self.word_languages {
            for page in 1..=self.page_count {
                resources.push(Resource {
                    url: format!(
                        "{api}/verses/by_page/{page}?language={}&words=true&per_page=all",
                        lang.code
                    ),
                    file_name: word_translation_file(lang.code, page),
                    kind: DataKind::WordTranslation,
                });
            }
        }

        for page in 1..=self.page_count {
            resources.push(Resource {
                url: format!(
                    "{api}/verses/by_page/{page}?words=true&word_fields=text_uthmani&per_page=all"
                ),
                file_name: word_text_file(page),
                kind: DataKind::WordText,
            });
        }

        resources
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}
