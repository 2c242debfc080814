//! Integration tests for the HTTP fetch engine
//!
//! These tests use wiremock to create mock HTTP servers and check the
//! engine's retry behaviour and metadata echo.

use tidemark::config::FetchConfig;
use tidemark::crawler::{FetchOutcome, FetchRequest, Fetcher, HttpFetcher, RequestKind};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_config() -> FetchConfig {
    FetchConfig {
        timeout_secs: 5,
        retry_times: 2,
        retry_delay_ms: 1,
        user_agent: "TestBot/1.0".to_string(),
    }
}

fn create_fetcher() -> HttpFetcher {
    HttpFetcher::new(&create_test_config(), &[]).expect("Failed to build fetcher")
}

#[tokio::test]
async fn test_fetch_echoes_metadata() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/en/ads/dhaka"))
        .and(header("user-agent", "TestBot/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>listing</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/en/ads/dhaka", mock_server.uri());
    let request = FetchRequest::listing(url.clone(), "leaf-key", 1);

    match create_fetcher().fetch(request).await {
        FetchOutcome::Fetched(document) => {
            assert_eq!(document.request_url, url);
            assert_eq!(document.status_code, 200);
            assert_eq!(document.body, "<html>listing</html>");
            assert_eq!(document.meta.kind, RequestKind::Listing);
            assert_eq!(document.meta.leaf_key.as_deref(), Some("leaf-key"));
            assert_eq!(document.meta.page, Some(1));
        }
        FetchOutcome::Failed { reason, .. } => panic!("fetch failed: {}", reason),
    }
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .with_priority(2)
        .mount(&mock_server)
        .await;

    let request = FetchRequest::detail(format!("{}/flaky", mock_server.uri()), None);
    let outcome = create_fetcher().fetch(request).await;

    assert!(matches!(outcome, FetchOutcome::Fetched(ref doc) if doc.body == "ok"));
}

#[tokio::test]
async fn test_rate_limit_is_retried_until_exhausted() {
    let mock_server = MockServer::start().await;

    // One attempt plus two retries
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let request = FetchRequest::detail(format!("{}/busy", mock_server.uri()), None);
    match create_fetcher().fetch(request).await {
        FetchOutcome::Failed { request, reason } => {
            assert!(reason.contains("429"));
            assert!(request.url.ends_with("/busy"));
        }
        FetchOutcome::Fetched(_) => panic!("expected failure"),
    }
}

#[tokio::test]
async fn test_not_found_is_permanent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/en/ad/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = FetchRequest::detail(
        format!("{}/en/ad/gone", mock_server.uri()),
        Some("leaf".to_string()),
    );
    match create_fetcher().fetch(request).await {
        FetchOutcome::Failed { request, reason } => {
            assert_eq!(reason, "HTTP 404");
            assert_eq!(request.meta.leaf_key.as_deref(), Some("leaf"));
        }
        FetchOutcome::Fetched(_) => panic!("expected failure"),
    }
}

#[tokio::test]
async fn test_redirect_reports_final_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/en/ads/old"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("{}/en/ads/new", mock_server.uri()).as_str()),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/en/ads/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
        .mount(&mock_server)
        .await;

    let old = format!("{}/en/ads/old", mock_server.uri());
    let request = FetchRequest::index(old.clone(), tidemark::crawler::Level::Category);

    match create_fetcher().fetch(request).await {
        FetchOutcome::Fetched(document) => {
            assert_eq!(document.request_url, old);
            assert!(document.url.ends_with("/en/ads/new"));
            assert_eq!(document.body, "moved");
        }
        FetchOutcome::Failed { reason, .. } => panic!("fetch failed: {}", reason),
    }
}
