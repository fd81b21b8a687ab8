//! Error types for the download module.
//!
//! This module defines structured errors for single-resource fetches and for
//! the batch as a whole, carrying the URL or cache file name needed to act on
//! the failure.

use std::fmt;

use thiserror::Error;

use crate::cache::CacheError;
use crate::catalog::{DataKind, Resource};

/// Errors that can occur while fetching and caching one resource.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present (for 429 responses).
        retry_after: Option<String>,
    },

    /// The response was 2xx but the body is not a JSON document.
    #[error("invalid JSON body from {url}: {source}")]
    InvalidBody {
        /// The URL whose body failed to decode.
        url: String,
        /// The decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The fetched body could not be written to the cache.
    #[error("failed to cache {file_name}: {source}")]
    Cache {
        /// Target cache file name.
        file_name: String,
        /// The underlying cache error.
        #[source]
        source: CacheError,
    },

    /// The request was abandoned because the batch was cancelled.
    #[error("cancelled fetching {url}")]
    Cancelled {
        /// The URL whose fetch was abandoned.
        url: String,
    },

    /// The worker task ended abnormally.
    #[error("fetch task for {url} aborted: {message}")]
    Task {
        /// The URL the task was fetching.
        url: String,
        /// Join error description.
        message: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid body error.
    pub fn invalid_body(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::InvalidBody {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a cache write error.
    pub fn cache(file_name: impl Into<String>, source: CacheError) -> Self {
        Self::Cache {
            file_name: file_name.into(),
            source,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Creates a task failure error.
    pub fn task(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Task {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// A resource that could not be fetched after all attempts.
#[derive(Debug)]
pub struct ResourceFailure {
    /// Cache file name (the resource identifier).
    pub file_name: String,
    /// URL that was requested.
    pub url: String,
    /// Kind of the failed resource.
    pub kind: DataKind,
    /// Number of attempts made.
    pub attempts: u32,
    /// Final error.
    pub error: DownloadError,
}

impl ResourceFailure {
    /// Builds a failure record for `resource`.
    #[must_use]
    pub fn new(resource: &Resource, attempts: u32, error: DownloadError) -> Self {
        Self {
            file_name: resource.file_name.clone(),
            url: resource.url.clone(),
            kind: resource.kind,
            attempts,
            error,
        }
    }
}

/// Aggregated failures from one batch, sorted by file name.
#[derive(Debug)]
pub struct BatchError {
    total: usize,
    failures: Vec<ResourceFailure>,
}

impl BatchError {
    /// Creates a batch error from the failures out of `total` requested resources.
    #[must_use]
    pub fn new(total: usize, mut failures: Vec<ResourceFailure>) -> Self {
        failures.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Self { total, failures }
    }

    /// Individual failures.
    #[must_use]
    pub fn failures(&self) -> &[ResourceFailure] {
        &self.failures
    }

    /// Number of resources in the batch.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} resources failed to download",
            self.failures.len(),
            self.total
        )?;
        for failure in &self.failures {
            write!(
                f,
                "\n  - {} ({} attempts): {}",
                failure.file_name, failure.attempts, failure.error
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchError {}
