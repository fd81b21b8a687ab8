//! Integration tests for the batch fetcher against a mock HTTP server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use qurancom_core::CacheStore;
use qurancom_core::catalog::{DataKind, Resource};
use qurancom_core::download::{
    BatchFetcher, DownloadError, EngineError, HttpClient, RateLimiter, ResourceFetcher,
    RetryPolicy,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;

use support::socket_guard::start_mock_server_or_skip;

const BODY: &str = r#"{"chapters":[]}"#;

fn resource(server: &MockServer, page: u16) -> Resource {
    Resource {
        url: format!("{}/verses/by_page/{page}?words=true", server.uri()),
        file_name: format!("word-text-{page:03}.json"),
        kind: DataKind::WordText,
    }
}

fn fast_fetcher(max_attempts: u32) -> BatchFetcher {
    let policy = RetryPolicy::with_max_attempts(max_attempts)
        .with_base_delay(Duration::from_millis(5))
        .without_jitter();
    BatchFetcher::new(4, policy, Arc::new(RateLimiter::disabled())).expect("valid concurrency")
}

fn http() -> Arc<dyn ResourceFetcher> {
    Arc::new(HttpClient::new().expect("client builds"))
}

async fn mount_page(server: &MockServer, page: u16, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/verses/by_page/{page}")))
        .and(query_param("words", "true"))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_caches_body_verbatim() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_page(&server, 1, ResponseTemplate::new(200).set_body_string(BODY)).await;
    let temp = TempDir::new().expect("temp dir");
    let store = CacheStore::open(temp.path()).expect("cache opens");

    let stats = fast_fetcher(3)
        .fetch_all(http(), &store, vec![resource(&server, 1)], &CancellationToken::new())
        .await
        .expect("batch succeeds");

    assert_eq!(stats.completed(), 1);
    assert_eq!(
        store.read("word-text-001.json").expect("readable"),
        Some(BODY.as_bytes().to_vec())
    );
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/verses/by_page/1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    let temp = TempDir::new().expect("temp dir");
    let store = CacheStore::open(temp.path()).expect("cache opens");

    let err = fast_fetcher(3)
        .fetch_all(http(), &store, vec![resource(&server, 1)], &CancellationToken::new())
        .await
        .expect_err("404 fails the batch");

    let EngineError::Batch(batch) = &err else {
        panic!("expected batch error, got {err:?}");
    };
    assert_eq!(batch.failures().len(), 1);
    assert_eq!(batch.failures()[0].attempts, 1);
    assert!(matches!(
        batch.failures()[0].error,
        DownloadError::HttpStatus { status: 404, .. }
    ));
    assert!(!store.exists("word-text-001.json"));
}

#[tokio::test]
async fn test_server_error_is_retried_until_success() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/verses/by_page/1"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_page(&server, 1, ResponseTemplate::new(200).set_body_string(BODY)).await;
    let temp = TempDir::new().expect("temp dir");
    let store = CacheStore::open(temp.path()).expect("cache opens");

    let stats = fast_fetcher(3)
        .fetch_all(http(), &store, vec![resource(&server, 1)], &CancellationToken::new())
        .await
        .expect("recovers on third attempt");

    assert_eq!(stats.completed(), 1);
    assert_eq!(stats.retried(), 2);
    assert!(store.exists("word-text-001.json"));
}

#[tokio::test]
async fn test_rate_limited_response_honours_retry_after() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/verses/by_page/1"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, 1, ResponseTemplate::new(200).set_body_string(BODY)).await;
    let temp = TempDir::new().expect("temp dir");
    let store = CacheStore::open(temp.path()).expect("cache opens");

    let started = Instant::now();
    fast_fetcher(2)
        .fetch_all(http(), &store, vec![resource(&server, 1)], &CancellationToken::new())
        .await
        .expect("succeeds after waiting");

    assert!(started.elapsed() >= Duration::from_millis(900));
    assert!(store.exists("word-text-001.json"));
}

#[tokio::test]
async fn test_invalid_json_body_is_retried_and_never_cached() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/verses/by_page/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(2)
        .mount(&server)
        .await;
    let temp = TempDir::new().expect("temp dir");
    let store = CacheStore::open(temp.path()).expect("cache opens");

    let err = fast_fetcher(2)
        .fetch_all(http(), &store, vec![resource(&server, 1)], &CancellationToken::new())
        .await
        .expect_err("body never decodes");

    assert!(matches!(err, EngineError::Batch(_)));
    assert!(!store.exists("word-text-001.json"));
}

#[tokio::test]
async fn test_one_failing_resource_does_not_block_the_rest() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    for page in 1..=5 {
        let template = if page == 3 {
            ResponseTemplate::new(500)
        } else {
            ResponseTemplate::new(200).set_body_string(BODY)
        };
        mount_page(&server, page, template).await;
    }
    let temp = TempDir::new().expect("temp dir");
    let store = CacheStore::open(temp.path()).expect("cache opens");
    let resources = (1..=5).map(|page| resource(&server, page)).collect();

    let err = fast_fetcher(3)
        .fetch_all(http(), &store, resources, &CancellationToken::new())
        .await
        .expect_err("page 3 exhausts its retries");

    let EngineError::Batch(batch) = &err else {
        panic!("expected batch error, got {err:?}");
    };
    assert_eq!(batch.total(), 5);
    let failed: Vec<_> = batch.failures().iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(failed, vec!["word-text-003.json"]);
    assert_eq!(batch.failures()[0].attempts, 3);
    for page in [1, 2, 4, 5] {
        assert!(store.exists(&format!("word-text-{page:03}.json")));
    }
    assert!(!store.exists("word-text-003.json"));
}
