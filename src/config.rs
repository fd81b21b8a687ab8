//! Pipeline configuration with defaults and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::catalog::{Catalog, DEFAULT_API_URL, Language};
use crate::download::{DEFAULT_BASE_DELAY, DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES};

/// Cache location relative to the destination directory.
const CACHE_SUBDIR: [&str; 2] = [".cache", "qurancom"];

/// Valid worker-pool sizes.
pub const CONCURRENCY_RANGE: std::ops::RangeInclusive<usize> = 1..=100;

/// Valid total attempt counts per resource.
pub const MAX_RETRIES_RANGE: std::ops::RangeInclusive<u32> = 1..=10;

/// Upper bound for backoff base and request spacing.
pub const MAX_DELAY_MS: u64 = 60_000;

/// Errors raised by [`PipelineConfig::validate`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric option is outside its accepted range.
    #[error("invalid {key} value {value}: expected range {range}")]
    OutOfRange {
        /// Option name.
        key: &'static str,
        /// Rejected value.
        value: u64,
        /// Accepted range, for display.
        range: String,
    },

    /// A language code is not supported upstream.
    #[error("unsupported language '{code}'")]
    UnknownLanguage {
        /// Rejected code.
        code: String,
    },

    /// The API URL is not an absolute http(s) URL.
    #[error("invalid api_url '{url}': {reason}")]
    InvalidApiUrl {
        /// Rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Options recognized by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Output root; the cache lives under `.cache/qurancom` inside it.
    pub destination: PathBuf,
    /// Wipe the cache before planning.
    pub clear_cache: bool,
    /// Fetch worker-pool size.
    pub concurrency: usize,
    /// Total attempts per resource.
    pub max_retries: u32,
    /// Base delay of the exponential backoff.
    pub backoff_base: Duration,
    /// Minimum spacing between requests to the same host; zero disables.
    pub request_delay: Duration,
    /// Upstream API root.
    pub api_url: String,
    /// Language codes to keep; empty keeps every supported language.
    pub languages: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            destination: PathBuf::from("."),
            clear_cache: false,
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BASE_DELAY,
            request_delay: Duration::ZERO,
            api_url: DEFAULT_API_URL.to_string(),
            languages: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Creates a default configuration writing to `destination`.
    #[must_use]
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            ..Self::default()
        }
    }

    /// Cache directory: `<destination>/.cache/qurancom`.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        CACHE_SUBDIR
            .iter()
            .fold(self.destination.clone(), |dir, part| dir.join(part))
    }

    /// Output root.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Checks every option against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !CONCURRENCY_RANGE.contains(&self.concurrency) {
            return Err(out_of_range(
                "concurrency",
                u64::try_from(self.concurrency).unwrap_or(u64::MAX),
                &CONCURRENCY_RANGE,
            ));
        }
        if !MAX_RETRIES_RANGE.contains(&self.max_retries) {
            return Err(out_of_range(
                "max_retries",
                u64::from(self.max_retries),
                &MAX_RETRIES_RANGE,
            ));
        }
        check_delay("backoff_base_ms", self.backoff_base)?;
        check_delay("request_delay_ms", self.request_delay)?;

        match url::Url::parse(&self.api_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::InvalidApiUrl {
                    url: self.api_url.clone(),
                    reason: format!("scheme '{}' is not supported", url.scheme()),
                });
            }
            Err(e) => {
                return Err(ConfigError::InvalidApiUrl {
                    url: self.api_url.clone(),
                    reason: e.to_string(),
                });
            }
        }

        self.selected_languages().map(|_| ())
    }

    /// Builds the full catalog for this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownLanguage`] for an unsupported language code.
    pub fn catalog(&self) -> Result<Catalog, ConfigError> {
        let catalog = Catalog::new(self.api_url.as_str());
        let Some(selected) = self.selected_languages()? else {
            return Ok(catalog);
        };
        let codes: Vec<&str> = selected.iter().map(|lang| lang.code).collect();
        debug!(languages = ?codes, "restricting catalog languages");
        Ok(catalog.retain_languages(&codes))
    }

    fn selected_languages(&self) -> Result<Option<Vec<Language>>, ConfigError> {
        if self.languages.is_empty() {
            return Ok(None);
        }
        self.languages
            .iter()
            .map(|code| {
                Language::from_code(code).ok_or_else(|| ConfigError::UnknownLanguage {
                    code: code.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

fn check_delay(key: &'static str, delay: Duration) -> Result<(), ConfigError> {
    let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if ms > MAX_DELAY_MS {
        return Err(out_of_range(key, ms, &(0..=MAX_DELAY_MS)));
    }
    Ok(())
}

fn out_of_range<T: std::fmt::Display>(
    key: &'static str,
    value: u64,
    range: &std::ops::RangeInclusive<T>,
) -> ConfigError {
    ConfigError::OutOfRange {
        key,
        value,
        range: format!("{}..={}", range.start(), range.end()),
    }
}
