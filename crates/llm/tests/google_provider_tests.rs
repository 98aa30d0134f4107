//! HTTP-level tests for `GoogleProvider` against a local wiremock server.

use std::time::Duration;

use llm::{Annotator, GoogleProvider, LlmError, RetryConfig, RunStatistics};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn provider(server: &MockServer) -> GoogleProvider {
    GoogleProvider::new("test-key", "gemini-2.5-flash")
        .expect("provider should build")
        .with_base_url(server.uri())
        .with_retry_config(
            RetryConfig::new()
                .with_base_delay(Duration::from_millis(1))
                .with_max_delay(Duration::from_millis(5)),
        )
}

fn success_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": {"parts": [{"text": text}], "role": "model"},
            "finishReason": "STOP",
            "index": 0
        }],
        "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 8, "totalTokenCount": 20}
    })
}

#[tokio::test]
async fn annotate_returns_candidate_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("ID: 7 | Prob: 0.9")))
        .expect(1)
        .mount(&server)
        .await;

    let mut stats = RunStatistics::new();
    let text = provider(&server)
        .annotate("score this", &mut stats)
        .await
        .expect("call succeeds");

    assert_eq!(text, "ID: 7 | Prob: 0.9");
    assert_eq!(stats, RunStatistics { total_calls: 1, retries: 0 });
}

#[tokio::test]
async fn rate_limit_is_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
        .up_to_n_times(4)
        .expect(4)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("ID: 1 | Prob: 0")))
        .expect(1)
        .mount(&server)
        .await;

    let mut stats = RunStatistics::new();
    let text = provider(&server)
        .annotate("score this", &mut stats)
        .await
        .expect("fifth attempt succeeds");

    assert_eq!(text, "ID: 1 | Prob: 0");
    assert_eq!(stats.total_calls, 5);
    assert_eq!(stats.retries, 4);
}

#[tokio::test]
async fn persistent_server_error_exhausts_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500).set_body_string("INTERNAL"))
        .expect(5)
        .mount(&server)
        .await;

    let mut stats = RunStatistics::new();
    let result = provider(&server).annotate("score this", &mut stats).await;

    assert!(matches!(result, Err(LlmError::ServerError(_))));
    assert_eq!(stats.total_calls, 5);
    assert_eq!(stats.retries, 4);
}

#[tokio::test]
async fn auth_failure_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(401).set_body_string("API key not valid"))
        .expect(1)
        .mount(&server)
        .await;

    let mut stats = RunStatistics::new();
    let result = provider(&server).annotate("score this", &mut stats).await;

    match result {
        Err(LlmError::Http { status, message }) => {
            assert_eq!(status, 401);
            assert!(message.contains("API key not valid"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(stats, RunStatistics { total_calls: 1, retries: 0 });
}

#[tokio::test]
async fn service_unavailable_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let mut stats = RunStatistics::new();
    let result = provider(&server).annotate("score this", &mut stats).await;

    assert!(matches!(result, Err(LlmError::Http { status: 503, .. })));
    assert_eq!(stats.retries, 0);
}

#[tokio::test]
async fn malformed_body_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&server)
        .await;

    let mut stats = RunStatistics::new();
    let result = provider(&server).annotate("score this", &mut stats).await;

    assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    assert_eq!(stats.total_calls, 1);
}
