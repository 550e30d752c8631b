//! Integration tests for the LLM router and HTTP providers
//!
//! Validates provider failover using wiremock servers.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use ticketeer_engine::config::OpenAIConfig;
use ticketeer_engine::llm::openai::OpenAIProvider;
use ticketeer_engine::llm::{ollama::OllamaProvider, router::LLMRouter, LLMError, LLMProvider, Message};
use ticketeer_engine::secrets::{SecretCache, OPENAI_API_KEY};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn ollama_reply(text: &str) -> serde_json::Value {
    json!({
        "model": "llama3.1:8b",
        "created_at": "2024-08-04T19:22:45.499127Z",
        "message": { "role": "assistant", "content": text },
        "done": true
    })
}

fn ollama(server: &MockServer) -> Box<dyn LLMProvider> {
    Box::new(OllamaProvider::new(server.uri(), "llama3.1:8b", Duration::from_secs(5)).unwrap())
}

#[tokio::test]
async fn test_router_fails_over_to_next_provider() {
    let failing_server = MockServer::start().await;
    let succeeding_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&failing_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ollama_reply("VALIDATE")))
        .mount(&succeeding_server)
        .await;

    let secrets = Arc::new(SecretCache::with_values(&[(OPENAI_API_KEY, "sk-test")]));
    let openai = Box::new(
        OpenAIProvider::new(
            OpenAIConfig {
                base_url: failing_server.uri(),
                model: "gpt-4o-mini".to_string(),
            },
            secrets,
            Duration::from_secs(5),
        )
        .unwrap(),
    );

    // openai is the default and fails (no /chat/completions mock), ollama answers
    let router = LLMRouter::new(
        vec![ollama(&succeeding_server), openai],
        "openai",
        Duration::from_secs(5),
    );

    let (reply, provider) = router.call(&[Message::user("classify")]).await.unwrap();
    assert_eq!(reply, "VALIDATE");
    assert_eq!(provider, "ollama");
}

#[tokio::test]
async fn test_single_provider_keeps_rate_limit_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let router = LLMRouter::new(vec![ollama(&server)], "ollama", Duration::from_secs(5));
    let err = router.complete("hello").await.unwrap_err();

    assert!(matches!(err, LLMError::RateLimitExceeded));
    assert_eq!(err.code(), "RATE_LIMIT");
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ollama_reply("late"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let router = LLMRouter::new(vec![ollama(&server)], "ollama", Duration::from_millis(200));
    let err = router.complete("hello").await.unwrap_err();
    assert_eq!(err.code(), "TRANSPORT_ERROR");
}

#[tokio::test]
async fn test_openai_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "INSIGHT" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let secrets = Arc::new(SecretCache::with_values(&[(OPENAI_API_KEY, "sk-test")]));
    let provider = OpenAIProvider::new(
        OpenAIConfig {
            base_url: server.uri(),
            model: "gpt-4o-mini".to_string(),
        },
        secrets,
        Duration::from_secs(5),
    )
    .unwrap();

    assert_eq!(provider.complete("classify").await.unwrap(), "INSIGHT");
}

#[tokio::test]
async fn test_ollama_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .mount(&server)
        .await;

    let router = LLMRouter::new(vec![ollama(&server)], "ollama", Duration::from_secs(5));
    assert_eq!(router.check_health_all().await, vec![("ollama".to_string(), true)]);
}
