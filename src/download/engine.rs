//! Batch fetcher: bounded-concurrency fetching with retry and caching.
//!
//! The [`BatchFetcher`] coordinates concurrent fetches using a
//! semaphore-based worker pool, retries transient failures with exponential
//! backoff, and persists each successful body to the [`CacheStore`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use qurancom_core::cache::CacheStore;
//! use qurancom_core::catalog::Catalog;
//! use qurancom_core::download::{BatchFetcher, HttpClient, RateLimiter, RetryPolicy};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CacheStore::open("./.cache/qurancom")?;
//! let fetcher = BatchFetcher::new(8, RetryPolicy::default(), Arc::new(RateLimiter::disabled()))?;
//! let client = Arc::new(HttpClient::new()?);
//! let resources = Catalog::default().resources();
//! let stats = fetcher
//!     .fetch_all(client, &store, resources, &CancellationToken::new())
//!     .await?;
//! println!("fetched {}, retried {}", stats.completed(), stats.retried());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::client::ResourceFetcher;
use super::error::{BatchError, DownloadError, ResourceFailure};
use super::rate_limiter::{RateLimiter, parse_retry_after};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use crate::cache::CacheStore;
use crate::catalog::Resource;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default worker-pool size.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Error type for batch fetch operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,

    /// The batch was cancelled before every resource settled.
    #[error("fetch cancelled: {completed} resources cached, {remaining} not fetched")]
    Cancelled {
        /// Resources persisted before cancellation.
        completed: usize,
        /// Resources that were abandoned or never issued.
        remaining: usize,
    },

    /// One or more resources failed after exhausting retries.
    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Outcome of one resource.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Body fetched and persisted.
    Persisted {
        /// The resource.
        resource: Resource,
        /// Cache location written.
        path: PathBuf,
    },
    /// Fetch or persist failed for good.
    Failed(ResourceFailure),
}

/// Statistics from a batch run.
///
/// Uses atomic counters for updates from concurrent worker tasks.
#[derive(Debug, Default)]
pub struct FetchStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    retried: AtomicUsize,
}

impl FetchStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of resources fetched and cached.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns the number of resources that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the total number of settled resources (completed + failed).
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.failed()
    }

    /// Returns the number of retry attempts made.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> Self {
        Self {
            completed: AtomicUsize::new(self.completed()),
            failed: AtomicUsize::new(self.failed()),
            retried: AtomicUsize::new(self.retried()),
        }
    }
}

/// Bounded worker pool that fetches resources into the cache.
///
/// # Concurrency Model
///
/// - Each resource runs in its own Tokio task
/// - A semaphore permit is acquired before spawning each task
/// - Permits are released automatically when tasks complete (RAII)
/// - A failing resource never cancels its siblings
///
/// # Retry Behavior
///
/// - Transient errors (network issues, 5xx, 429) are retried with exponential backoff
/// - `Retry-After` on 429 replaces the computed backoff
/// - Permanent errors (404, 400, cache write failures) fail immediately
#[derive(Debug)]
pub struct BatchFetcher {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    retry_policy: RetryPolicy,
    rate_limiter: Arc<RateLimiter>,
}

impl BatchFetcher {
    /// Creates a fetcher with the given pool size, retry policy and rate limiter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    #[instrument(level = "debug", skip(retry_policy, rate_limiter))]
    pub fn new(
        concurrency: usize,
        retry_policy: RetryPolicy,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_attempts = retry_policy.max_attempts(),
            request_delay_ms = rate_limiter.delay().as_millis(),
            "creating batch fetcher"
        );

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            retry_policy,
            rate_limiter,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Fetches every resource into `store`.
    ///
    /// All resources settle before this returns. Cancelling `cancel` stops
    /// issuing new fetches and makes in-flight ones give up at their next
    /// suspension point; entries persisted so far stay valid.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Batch`] listing every failed resource when at least one failed
    /// - [`EngineError::Cancelled`] when `cancel` fired before the batch settled
    /// - [`EngineError::SemaphoreClosed`] if the pool semaphore was closed
    #[instrument(skip_all, fields(resources = resources.len(), dir = %store.dir().display()))]
    pub async fn fetch_all(
        &self,
        fetcher: Arc<dyn ResourceFetcher>,
        store: &CacheStore,
        resources: Vec<Resource>,
        cancel: &CancellationToken,
    ) -> Result<FetchStats, EngineError> {
        let total = resources.len();
        let stats = Arc::new(FetchStats::new());
        let mut handles = Vec::with_capacity(total);

        info!(total, concurrency = self.concurrency, "starting batch fetch");

        for resource in resources {
            if cancel.is_cancelled() {
                break;
            }

            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                permit = Arc::clone(&self.semaphore).acquire_owned() => {
                    permit.map_err(|_| EngineError::SemaphoreClosed)?
                }
            };

            let url = resource.url.clone();
            let task = WorkerTask {
                fetcher: Arc::clone(&fetcher),
                store: store.clone(),
                policy: self.retry_policy.clone(),
                rate_limiter: Arc::clone(&self.rate_limiter),
                stats: Arc::clone(&stats),
                cancel: cancel.clone(),
            };
            let failed_resource = resource.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                task.run(resource).await
            });
            handles.push((failed_resource, url, handle));
        }

        let issued = handles.len();
        debug!(issued, "waiting for fetch tasks to settle");

        let mut failures = Vec::new();
        for (resource, url, handle) in handles {
            match handle.await {
                Ok(FetchOutcome::Persisted { resource, path }) => {
                    debug!(
                        file_name = %resource.file_name,
                        path = %path.display(),
                        "resource cached"
                    );
                }
                Ok(FetchOutcome::Failed(failure)) => failures.push(failure),
                Err(e) => {
                    warn!(file_name = %resource.file_name, error = %e, "fetch task panicked");
                    stats.increment_failed();
                    failures.push(ResourceFailure::new(
                        &resource,
                        0,
                        DownloadError::task(url, e.to_string()),
                    ));
                }
            }
        }

        let completed = stats.completed();
        info!(
            completed,
            failed = failures.len(),
            retried = stats.retried(),
            total,
            "batch fetch settled"
        );

        if cancel.is_cancelled() && completed < total {
            return Err(EngineError::Cancelled {
                completed,
                remaining: total - completed,
            });
        }

        if !failures.is_empty() {
            return Err(BatchError::new(total, failures).into());
        }

        Ok(stats.snapshot())
    }
}

/// Per-resource state moved into a spawned worker.
struct WorkerTask {
    fetcher: Arc<dyn ResourceFetcher>,
    store: CacheStore,
    policy: RetryPolicy,
    rate_limiter: Arc<RateLimiter>,
    stats: Arc<FetchStats>,
    cancel: CancellationToken,
}

impl WorkerTask {
    async fn run(self, resource: Resource) -> FetchOutcome {
        let result = match self.fetch_with_retry(&resource).await {
            Ok((body, attempts)) => self
                .persist(&resource, body)
                .await
                .map_err(|error| (error, attempts)),
            Err(failure) => Err(failure),
        };

        match result {
            Ok(path) => {
                self.stats.increment_completed();
                FetchOutcome::Persisted { resource, path }
            }
            Err((error, attempts)) => {
                warn!(
                    file_name = %resource.file_name,
                    url = %resource.url,
                    error = %error,
                    attempts,
                    "resource failed after all attempts"
                );
                self.stats.increment_failed();
                FetchOutcome::Failed(ResourceFailure::new(&resource, attempts, error))
            }
        }
    }

    /// Fetches the body, retrying transient failures.
    ///
    /// Both outcomes carry the number of attempts made.
    #[instrument(skip_all, fields(file_name = %resource.file_name))]
    async fn fetch_with_retry(
        &self,
        resource: &Resource,
    ) -> Result<(Vec<u8>, u32), (DownloadError, u32)> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting fetch");

            let outcome = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    return Err((DownloadError::cancelled(&resource.url), attempt));
                }
                outcome = async {
                    self.rate_limiter.acquire(&resource.url).await;
                    self.fetcher.fetch(&resource.url).await
                } => outcome,
            };

            let error = match outcome {
                Ok(body) => return Ok((body, attempt)),
                Err(error) => error,
            };

            let failure_type = classify_error(&error);
            let retry_after = if failure_type == FailureType::RateLimited {
                retry_after_delay(&error)
            } else {
                None
            };

            match self.policy.should_retry(failure_type, attempt) {
                RetryDecision::Retry {
                    delay: backoff,
                    attempt: next_attempt,
                } => {
                    let delay = retry_after.unwrap_or(backoff);
                    info!(
                        url = %resource.url,
                        attempt = next_attempt,
                        max_attempts = self.policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        using_retry_after = retry_after.is_some(),
                        error = %error,
                        "retrying fetch"
                    );
                    self.stats.increment_retried();
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => {
                            return Err((DownloadError::cancelled(&resource.url), attempt));
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url = %resource.url, %reason, "not retrying fetch");
                    return Err((error, attempt));
                }
            }
        }
    }

    /// Writes the body to the cache off the async runtime threads.
    async fn persist(&self, resource: &Resource, body: Vec<u8>) -> Result<PathBuf, DownloadError> {
        let store = self.store.clone();
        let file_name = resource.file_name.clone();
        tokio::task::spawn_blocking(move || store.persist(&file_name, &body))
            .await
            .map_err(|e| DownloadError::task(&resource.url, e.to_string()))?
            .map_err(|e| DownloadError::cache(&resource.file_name, e))
    }
}

/// Extracts the server-mandated delay from a 429 error, if any.
fn retry_after_delay(error: &DownloadError) -> Option<Duration> {
    let DownloadError::HttpStatus {
        retry_after: Some(header),
        ..
    } = error
    else {
        return None;
    };
    let delay = parse_retry_after(header)?;
    debug!(retry_after = %header, delay_ms = delay.as_millis(), "using Retry-After header delay");
    Some(delay)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::catalog::DataKind;

    /// Scripted fetcher: each URL maps to a queue of responses; the last one repeats.
    #[derive(Default)]
    struct ScriptedFetcher {
        responses: Mutex<HashMap<String, Vec<Result<Vec<u8>, u16>>>>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl ScriptedFetcher {
        fn script(self, url: &str, responses: Vec<Result<Vec<u8>, u16>>) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(url.to_string(), responses);
            self
        }

        fn calls(&self, url: &str) -> usize {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl ResourceFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let count = calls.entry(url.to_string()).or_insert(0);
                *count += 1;
                *count
            };
            let responses = self.responses.lock().unwrap();
            let script = responses
                .get(url)
                .ok_or_else(|| DownloadError::http_status(url, 404))?;
            let index = (call - 1).min(script.len() - 1);
            match &script[index] {
                Ok(body) => Ok(body.clone()),
                Err(status) => Err(DownloadError::http_status(url, *status)),
            }
        }
    }

    fn resource(n: u16) -> Resource {
        Resource {
            url: format!("https://api.test/chapters/{n}/info?language=en"),
            file_name: format!("chapter-info-en-{n:03}.json"),
            kind: DataKind::ChapterInfo,
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5), 2.0)
            .without_jitter()
    }

    fn fetcher(concurrency: usize) -> BatchFetcher {
        BatchFetcher::new(concurrency, fast_policy(), Arc::new(RateLimiter::disabled())).unwrap()
    }

    #[test]
    fn test_new_valid_concurrency() {
        for value in [1, DEFAULT_CONCURRENCY, 100] {
            assert_eq!(fetcher(value).concurrency(), value);
        }
    }

    #[test]
    fn test_new_invalid_concurrency() {
        for value in [0, 101] {
            let result = BatchFetcher::new(value, fast_policy(), Arc::new(RateLimiter::disabled()));
            assert!(matches!(
                result,
                Err(EngineError::InvalidConcurrency { value: v }) if v == value
            ));
        }
    }

    #[test]
    fn test_engine_error_display() {
        let msg = EngineError::InvalidConcurrency { value: 0 }.to_string();
        assert!(msg.contains("invalid concurrency"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn test_stats_increment() {
        let stats = FetchStats::new();
        stats.increment_completed();
        stats.increment_completed();
        stats.increment_failed();
        stats.increment_retried();
        assert_eq!(stats.completed(), 2);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.retried(), 1);
        assert_eq!(stats.total(), 3);
    }

    #[tokio::test]
    async fn test_fetch_all_persists_every_resource() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::open(temp.path()).unwrap();
        let resources: Vec<_> = (1..=5).map(resource).collect();
        let mut scripted = ScriptedFetcher::default();
        for r in &resources {
            scripted = scripted.script(&r.url, vec![Ok(b"{\"ok\":true}".to_vec())]);
        }

        let stats = fetcher(2)
            .fetch_all(Arc::new(scripted), &store, resources.clone(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.completed(), 5);
        assert_eq!(stats.failed(), 0);
        for r in &resources {
            assert!(store.exists(&r.file_name));
        }
    }

    #[tokio::test]
    async fn test_exhausted_resource_does_not_stop_siblings() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::open(temp.path()).unwrap();
        let resources: Vec<_> = (1..=4).map(resource).collect();
        let scripted = Arc::new(
            ScriptedFetcher::default()
                .script(&resources[0].url, vec![Ok(b"{}".to_vec())])
                .script(&resources[1].url, vec![Err(500)])
                .script(&resources[2].url, vec![Ok(b"{}".to_vec())])
                .script(&resources[3].url, vec![Ok(b"{}".to_vec())]),
        );

        let result = fetcher(4)
            .fetch_all(
                Arc::clone(&scripted) as Arc<dyn ResourceFetcher>,
                &store,
                resources.clone(),
                &CancellationToken::new(),
            )
            .await;

        let Err(EngineError::Batch(batch)) = result else {
            panic!("expected batch error, got {result:?}");
        };
        assert_eq!(batch.failures().len(), 1);
        assert_eq!(batch.failures()[0].file_name, resources[1].file_name);
        assert_eq!(batch.failures()[0].attempts, 3);
        assert_eq!(scripted.calls(&resources[1].url), 3);
        assert!(!store.exists(&resources[1].file_name));
        for r in [&resources[0], &resources[2], &resources[3]] {
            assert!(store.exists(&r.file_name), "{} should be cached", r.file_name);
        }
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_on_retry() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::open(temp.path()).unwrap();
        let r = resource(1);
        let scripted = Arc::new(
            ScriptedFetcher::default().script(&r.url, vec![Err(503), Err(429), Ok(b"[]".to_vec())]),
        );

        let stats = fetcher(1)
            .fetch_all(
                Arc::clone(&scripted) as Arc<dyn ResourceFetcher>,
                &store,
                vec![r.clone()],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(stats.completed(), 1);
        assert_eq!(stats.retried(), 2);
        assert_eq!(scripted.calls(&r.url), 3);
        assert_eq!(store.read(&r.file_name).unwrap().unwrap(), b"[]");
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::open(temp.path()).unwrap();
        let r = resource(1);
        let scripted = Arc::new(ScriptedFetcher::default().script(&r.url, vec![Err(404)]));

        let result = fetcher(1)
            .fetch_all(
                Arc::clone(&scripted) as Arc<dyn ResourceFetcher>,
                &store,
                vec![r.clone()],
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(EngineError::Batch(_))));
        assert_eq!(scripted.calls(&r.url), 1);
    }

    #[tokio::test]
    async fn test_cache_write_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::at(temp.path().join("missing-dir"));
        let r = resource(1);
        let scripted = ScriptedFetcher::default().script(&r.url, vec![Ok(b"{}".to_vec())]);

        let result = fetcher(1)
            .fetch_all(Arc::new(scripted), &store, vec![r], &CancellationToken::new())
            .await;

        let Err(EngineError::Batch(batch)) = result else {
            panic!("expected batch error, got {result:?}");
        };
        assert!(matches!(
            batch.failures()[0].error,
            DownloadError::Cache { .. }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_batch_issues_nothing() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::open(temp.path()).unwrap();
        let resources: Vec<_> = (1..=3).map(resource).collect();
        let scripted = Arc::new(ScriptedFetcher::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fetcher(2)
            .fetch_all(
                Arc::clone(&scripted) as Arc<dyn ResourceFetcher>,
                &store,
                resources.clone(),
                &cancel,
            )
            .await;

        assert!(matches!(
            result,
            Err(EngineError::Cancelled {
                completed: 0,
                remaining: 3
            })
        ));
        for r in &resources {
            assert_eq!(scripted.calls(&r.url), 0);
            assert!(!store.exists(&r.file_name));
        }
    }

    /// Answers the listed URLs at once and stalls on every other one.
    struct StallingFetcher {
        ready: Vec<String>,
    }

    #[async_trait]
    impl ResourceFetcher for StallingFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
            if !self.ready.iter().any(|ready| ready == url) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(b"{}".to_vec())
        }
    }

    #[tokio::test]
    async fn test_cancel_abandons_in_flight_fetches_and_keeps_cached_entries() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::open(temp.path()).unwrap();
        let resources: Vec<_> = (1..=5).map(resource).collect();
        let stalling = StallingFetcher {
            ready: vec![resources[0].url.clone()],
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            fetcher(5).fetch_all(Arc::new(stalling), &store, resources.clone(), &cancel),
        )
        .await
        .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(
            result,
            Err(EngineError::Cancelled {
                completed: 1,
                remaining: 4
            })
        ));
        assert_eq!(
            store.read(&resources[0].file_name).unwrap(),
            Some(b"{}".to_vec())
        );
        for r in &resources[1..] {
            assert!(!store.exists(&r.file_name));
        }
    }

    #[tokio::test]
    async fn test_empty_batch_succeeds() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::open(temp.path()).unwrap();
        let stats = fetcher(2)
            .fetch_all(
                Arc::new(ScriptedFetcher::default()),
                &store,
                Vec::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(stats.total(), 0);
    }

    #[test]
    fn test_retry_after_delay_only_for_header() {
        let with_header = DownloadError::http_status_with_retry_after(
            "https://api.test",
            429,
            Some("2".to_string()),
        );
        assert_eq!(retry_after_delay(&with_header), Some(Duration::from_secs(2)));
        assert_eq!(
            retry_after_delay(&DownloadError::http_status("https://api.test", 429)),
            None
        );
    }
}
