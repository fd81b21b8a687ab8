//! quran.com fetch-cache-aggregate library
//!
//! This library fetches reference data (chapter names, chapter info, word
//! translations and word text) from the quran.com API, caches every raw
//! response on disk, and folds the cached fragments into a few consolidated,
//! deterministic JSON files per language.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`catalog`] - Supported languages, data kinds and the full resource catalog
//! - [`cache`] - Filename-addressed on-disk cache with atomic writes
//! - [`plan`] - Request planning against the cache
//! - [`download`] - Bounded-concurrency batch fetcher with retry and backoff
//! - [`parser`] - One parser per data kind, producing ordered records
//! - [`writer`] - Consolidated artifact writers
//! - [`config`] - Pipeline options and validation
//! - [`pipeline`] - The orchestrator tying the stages together

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod catalog;
pub mod config;
pub mod download;
pub mod parser;
pub mod pipeline;
pub mod plan;
pub mod writer;

// Re-export commonly used types
pub use cache::{CacheError, CacheStore};
pub use catalog::{Catalog, DataKind, Language, Resource};
pub use config::{ConfigError, PipelineConfig};
pub use download::{
    BatchError, BatchFetcher, DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DownloadError,
    EngineError, FetchStats, HttpClient, RateLimiter, ResourceFetcher, RetryPolicy,
};
pub use parser::{ParseError, WordKey};
pub use pipeline::{Pipeline, PipelineError, RunReport, Stage};
pub use plan::{FetchPlan, plan_requests};
pub use writer::WriteError;
