//! Batch fetching of upstream JSON documents into the cache.
//!
//! This module fetches every pending [`crate::catalog::Resource`] with a
//! bounded worker pool, retries transient failures, and persists each body
//! atomically through [`crate::cache::CacheStore`].
//!
//! # Features
//!
//! - Bounded concurrency (semaphore-based worker pool)
//! - Exponential backoff with jitter, honoring `Retry-After` on 429
//! - Optional per-host request spacing
//! - Partial-failure aggregation into one [`BatchError`]
//! - Cooperative cancellation via [`tokio_util::sync::CancellationToken`]
//!
//! # Example
//!
//! ```no_run
//! use qurancom_core::download::{HttpClient, ResourceFetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let body = client
//!     .fetch("https://api.quran.com/api/v4/chapters?language=en")
//!     .await?;
//! println!("{} bytes", body.len());
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod engine;
mod error;
pub mod rate_limiter;
mod retry;

pub use client::{HttpClient, ResourceFetcher};
pub use engine::{BatchFetcher, DEFAULT_CONCURRENCY, EngineError, FetchOutcome, FetchStats};
pub use error::{BatchError, DownloadError, ResourceFailure};
pub use rate_limiter::{RateLimiter, extract_host, parse_retry_after};
pub use retry::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy,
    classify_error,
};
