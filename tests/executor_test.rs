//! Integration tests for the rate-limited request executor
//!
//! A wiremock server stands in for the upstream API so the tests can observe
//! backoff timing, retry counts, and concurrency behavior.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use unwrapped::error::AppError;
use unwrapped::services::{RequestExecutor, UpstreamRequest};

fn ok_body() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "ok": true }))
}

#[tokio::test]
async fn test_retry_after_is_honored_then_reset() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "2"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ok_body())
        .mount(&server)
        .await;

    let executor = RequestExecutor::new(10, 5);
    let started = Instant::now();

    let value = executor
        .execute(UpstreamRequest::get(format!("{}/data", server.uri())).for_user("u1"))
        .await
        .unwrap();

    // Second attempt was issued no earlier than the advertised quiet period.
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(value, json!({ "ok": true }));

    // Any non-429 response resets the recorded limit to zero.
    assert_eq!(executor.recorded_retry_after("u1").await, 0);
}

#[tokio::test]
async fn test_missing_retry_after_defaults_to_one_second() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "soon"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ok_body())
        .mount(&server)
        .await;

    let executor = RequestExecutor::new(10, 5);
    let started = Instant::now();

    executor
        .execute(UpstreamRequest::get(format!("{}/data", server.uri())).for_user("u1"))
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_non_429_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let executor = RequestExecutor::new(10, 5);

    let err = executor
        .execute(UpstreamRequest::get(format!("{}/data", server.uri())).for_user("u1"))
        .await
        .unwrap_err();

    match err {
        AppError::Upstream { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected Upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_json_body_surfaces_raw_text() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let executor = RequestExecutor::new(10, 5);

    let err = executor
        .execute(UpstreamRequest::get(format!("{}/data", server.uri())))
        .await
        .unwrap_err();

    match err {
        AppError::UpstreamDecode { body } => assert_eq!(body, "<html>not json</html>"),
        other => panic!("expected UpstreamDecode error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_retry_budget_is_bounded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "0"))
        .expect(3)
        .mount(&server)
        .await;

    let executor = RequestExecutor::new(10, 3);

    let err = executor
        .execute(UpstreamRequest::get(format!("{}/data", server.uri())).for_user("u1"))
        .await
        .unwrap_err();

    match err {
        AppError::RateLimited { attempts } => assert_eq!(attempts, 3),
        other => panic!("expected RateLimited error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_recorded_limit_applies_before_next_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ok_body())
        .mount(&server)
        .await;

    // Budget of one attempt: the first call records the limit and fails.
    let executor = RequestExecutor::new(10, 1);
    let err = executor
        .execute(UpstreamRequest::get(format!("{}/data", server.uri())).for_user("u1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RateLimited { .. }));
    assert_eq!(executor.recorded_retry_after("u1").await, 1);

    // The next call for that user sleeps the quiet period before issuing.
    let started = Instant::now();
    executor
        .execute(UpstreamRequest::get(format!("{}/data", server.uri())).for_user("u1"))
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(executor.recorded_retry_after("u1").await, 0);
}

#[tokio::test]
async fn test_same_user_requests_are_serialized() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ok_body().set_delay(Duration::from_millis(200)))
        .mount(&server)
        .await;

    let executor = Arc::new(RequestExecutor::new(10, 5));
    let started = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let executor = executor.clone();
        let url = format!("{}/data", server.uri());
        handles.push(tokio::spawn(async move {
            executor
                .execute(UpstreamRequest::get(url).for_user("u1"))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Two 200ms calls behind one per-user lock cannot overlap.
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn test_rate_limited_user_does_not_delay_others() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "2"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ok_body())
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/fast"))
        .respond_with(ok_body())
        .mount(&server)
        .await;

    let executor = Arc::new(RequestExecutor::new(10, 5));

    // u1 enters a two second backoff.
    let u1 = {
        let executor = executor.clone();
        let url = format!("{}/slow", server.uri());
        tokio::spawn(async move {
            executor
                .execute(UpstreamRequest::get(url).for_user("u1"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    // u2 proceeds while u1 sleeps.
    let started = Instant::now();
    executor
        .execute(UpstreamRequest::get(format!("{}/fast", server.uri())).for_user("u2"))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    u1.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_different_users_run_concurrently() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ok_body().set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let executor = Arc::new(RequestExecutor::new(10, 5));
    let started = Instant::now();

    let mut handles = Vec::new();
    for user in ["u1", "u2", "u3"] {
        let executor = executor.clone();
        let url = format!("{}/data", server.uri());
        handles.push(tokio::spawn(async move {
            executor
                .execute(UpstreamRequest::get(url).for_user(user))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Three 300ms calls under a cap of 10 overlap instead of queueing.
    assert!(started.elapsed() < Duration::from_millis(800));
}
