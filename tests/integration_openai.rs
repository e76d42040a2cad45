#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

use std::sync::Arc;
use std::time::Duration;

use game_memory::config::ProviderConfig;
use game_memory::providers::{
    ConsultationService, Credentials, EmbeddingProvider, OpenAiClient, ProviderError,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> Arc<OpenAiClient> {
    let config = ProviderConfig {
        base_url: format!("{}/v1", server.uri()),
        ..ProviderConfig::default()
    };

    let client = OpenAiClient::new(&config, Credentials::new("test-key"))
        .expect("client should build")
        .with_timeout(Duration::from_secs(5))
        .with_retry_attempts(3)
        .with_retry_backoff(Duration::from_millis(10));
    Arc::new(client)
}

/// Run a blocking provider call off the async test runtime
async fn blocking<T, F>(f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .expect("blocking task should not panic")
}

#[tokio::test(flavor = "multi_thread")]
async fn embedding_request_and_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "text-embedding-ada-002",
            "input": ["function jump() {}"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{ "object": "embedding", "index": 0, "embedding": [0.25, -0.5, 1.0] }],
            "model": "text-embedding-ada-002"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let vector = blocking(move || client.embed("function jump() {}")).await;

    assert_eq!(vector, Ok(vec![0.25, -0.5, 1.0]));
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_completion_request_and_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "gpt-4-turbo",
            "messages": [
                { "role": "system", "content": "You are an expert game developer specializing in Phaser 3." },
                { "role": "user", "content": "How do enemies spawn?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Through the EnemyManager." },
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let reply = blocking(move || {
        client.complete(
            "You are an expert game developer specializing in Phaser 3.",
            "How do enemies spawn?",
        )
    })
    .await;

    assert_eq!(reply, Ok("Through the EnemyManager.".to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = blocking(move || client.embed("anything")).await;

    assert_eq!(result, Err(ProviderError::Auth(401)));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "embedding": [1.0, 0.0] }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = blocking(move || client.embed("retry me")).await;

    assert_eq!(result, Ok(vec![1.0, 0.0]));
}

#[tokio::test(flavor = "multi_thread")]
async fn retries_give_up_after_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = blocking(move || client.complete("system", "user")).await;

    assert_eq!(result, Err(ProviderError::Status(500)));
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_payloads_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let (embedding, reply) =
        blocking(move || (client.embed("text"), client.complete("system", "user"))).await;

    assert!(matches!(embedding, Err(ProviderError::Malformed(_))));
    assert!(matches!(reply, Err(ProviderError::Malformed(_))));
}
