//! Per-host request spacing and Retry-After handling.
//!
//! The [`RateLimiter`] enforces a minimum delay between consecutive requests
//! to the same host. Workers share one limiter behind an `Arc`; requests to
//! different hosts never wait on each other.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use qurancom_core::download::RateLimiter;
//!
//! # async fn example() {
//! let limiter = Arc::new(RateLimiter::new(Duration::from_millis(250)));
//! limiter.acquire("https://api.quran.com/api/v4/chapters").await;
//! limiter.acquire("https://api.quran.com/api/v4/chapters/1/info").await; // waits ~250ms
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::constants::MAX_RETRY_AFTER;

/// Per-host request spacing shared by all fetch workers.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum time between two requests to one host.
    delay: Duration,

    /// Last request instant per host. The `Arc` lets a caller release the
    /// map shard before awaiting the inner mutex.
    hosts: DashMap<String, Arc<Mutex<Option<Instant>>>>,
}

impl RateLimiter {
    /// Creates a limiter that spaces same-host requests by `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        debug!(delay_ms = delay.as_millis(), "creating rate limiter");
        Self {
            delay,
            hosts: DashMap::new(),
        }
    }

    /// Creates a limiter that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Returns whether spacing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.delay.is_zero()
    }

    /// Configured spacing.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Waits until a request to `url`'s host is allowed, then records it.
    ///
    /// The first request to a host proceeds immediately.
    #[instrument(level = "trace", skip(self), fields(host))]
    pub async fn acquire(&self, url: &str) {
        if self.is_disabled() {
            return;
        }

        let host = extract_host(url);
        tracing::Span::current().record("host", host.as_str());

        let slot = self
            .hosts
            .entry(host)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let mut last_request = slot.lock().await;
        if let Some(previous) = *last_request {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                let wait = self.delay - elapsed;
                debug!(wait_ms = wait.as_millis(), "spacing request");
                tokio::time::sleep(wait).await;
            }
        }
        *last_request = Some(Instant::now());
    }
}

/// Extracts the lowercase host from a URL, or `"unknown"` if it has none.
///
/// # Examples
///
/// ```
/// use qurancom_core::download::rate_limiter::extract_host;
///
/// assert_eq!(extract_host("https://API.quran.com/api/v4"), "api.quran.com");
/// assert_eq!(extract_host("not a url"), "unknown");
/// ```
#[must_use]
pub fn extract_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parses a Retry-After header value into a Duration.
///
/// Supports integer seconds (`120`) and HTTP-dates
/// (`Wed, 21 Oct 2025 07:28:00 GMT`). Values above one hour are capped.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use qurancom_core::download::rate_limiter::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
#[instrument(level = "trace")]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    let duration = if let Ok(seconds) = header_value.parse::<i64>() {
        let seconds = u64::try_from(seconds).ok()?;
        Duration::from_secs(seconds)
    } else {
        let date = httpdate::parse_http_date(header_value).ok()?;
        // A date in the past means "retry now".
        date.duration_since(std::time::SystemTime::now())
            .unwrap_or(Duration::ZERO)
    };

    if duration > MAX_RETRY_AFTER {
        warn!(
            requested_secs = duration.as_secs(),
            max_secs = MAX_RETRY_AFTER.as_secs(),
            "Retry-After exceeds maximum, capping"
        );
        return Some(MAX_RETRY_AFTER);
    }
    Some(duration)
}
