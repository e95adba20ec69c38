mod common;

use futures::StreamExt;
use multiai_core::{ChatRequest, ModelRouter, ProviderConfig, RouterConfig, RouterError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{init_logging, sse_response};

async fn failing_openai() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("server error"))
        .mount(&server)
        .await;
    server
}

fn config(openai: &MockServer, anthropic: &MockServer) -> RouterConfig {
    RouterConfig {
        providers: vec![
            ProviderConfig::new("anthropic", "anthropic-key")
                .with_priority(2)
                .with_base_url(anthropic.uri()),
            ProviderConfig::new("openai", "openai-key")
                .with_priority(1)
                .with_base_url(openai.uri()),
            ProviderConfig::new("cohere", "cohere-key"),
        ],
    }
}

#[tokio::test]
async fn test_router_falls_back_over_http() {
    init_logging();
    let openai = failing_openai().await;
    let anthropic = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({"model": "claude-3-haiku-20240307"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "from claude"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1000, "output_tokens": 1000}
        })))
        .expect(1)
        .mount(&anthropic)
        .await;

    let router = ModelRouter::from_config(&config(&openai, &anthropic));
    assert_eq!(router.provider_names(), vec!["openai", "anthropic"]);

    let request = ChatRequest::message("cheap", "Hello");
    let response = router.chat(&request).await.unwrap();

    assert_eq!(response.text, "from claude");
    assert_eq!(response.provider, "anthropic");
    assert_eq!(request.model, "cheap");

    let stats = router.cost_stats();
    assert_eq!(stats.total_requests, 1);
    assert!((stats.by_provider["anthropic"].cost - 0.0015).abs() < 1e-9);
    assert!(!stats.by_provider.contains_key("openai"));

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["total_requests"], 1);
}

#[tokio::test]
async fn test_router_reports_every_failure() {
    let openai = failing_openai().await;
    let anthropic = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&anthropic)
        .await;

    let router = ModelRouter::from_config(&config(&openai, &anthropic));
    let err = router
        .chat(&ChatRequest::message("smart", "Hello"))
        .await
        .unwrap_err();

    let failures = err.failures();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].provider, "openai");
    assert!(failures[0].error.contains("500"));
    assert_eq!(failures[1].provider, "anthropic");
    assert!(failures[1].error.contains("bad key"));
}

#[tokio::test]
async fn test_router_stream_falls_back_before_first_chunk() {
    init_logging();
    let openai = failing_openai().await;
    let anthropic = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(sse_response(&[
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hel"}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"lo"}}"#,
            r#"{"type":"message_stop"}"#,
        ]))
        .mount(&anthropic)
        .await;

    let router = ModelRouter::from_config(&config(&openai, &anthropic));
    let chunks: Vec<_> = router
        .chat_stream(&ChatRequest::message("fast", "Hi"))
        .map(|r| r.unwrap())
        .collect()
        .await;

    let text: String = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(text, "Hello");
    assert!(chunks.iter().all(|c| c.provider == "anthropic"));
}

#[tokio::test]
async fn test_router_stream_partial_failure() {
    let openai = MockServer::start().await;
    let anthropic = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse_response(&[
            r#"{"choices":[{"index":0,"delta":{"content":"Hel"}}]}"#,
            r#"{"error":{"message":"connection dropped"}}"#,
        ]))
        .mount(&openai)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&anthropic)
        .await;

    let router = ModelRouter::from_config(&config(&openai, &anthropic));
    let items: Vec<_> = router
        .chat_stream(&ChatRequest::message("gpt-4o", "Hi"))
        .collect()
        .await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap().text, "Hel");
    match &items[1] {
        Err(RouterError::PartialStream { provider, .. }) => assert_eq!(provider, "openai"),
        other => panic!("expected partial stream error, got {:?}", other),
    }
}
