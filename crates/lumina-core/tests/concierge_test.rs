use std::sync::Arc;
use std::time::Duration;

use lumina_core::{
    Catalog, ChatError, ChatRole, ClaudeClient, GeminiClient, ModelClient, OllamaClient,
    OpenAIClient, Provider, ShoppingAssistant, FALLBACK_MESSAGE,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GEMINI_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn gemini_body(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

fn assistant_for(client: impl Into<ModelClient>, model: &str) -> ShoppingAssistant {
    ShoppingAssistant::new(Arc::new(Catalog::builtin()), client.into(), model)
}

fn product_ids(assistant: &ShoppingAssistant) -> Vec<String> {
    assistant
        .transcript()
        .last()
        .map(|m| m.products.iter().map(|p| p.id.clone()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_gemini_recommendation_resolves_products() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "generationConfig": { "responseMimeType": "application/json" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(
            r#"{"message":"The Elysium Chronograph is timeless.","recommendedProductIds":["1","999"]}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = GeminiClient::new("test-key").with_base_url(&server.uri());
    let mut assistant = assistant_for(client, "gemini-2.5-flash");

    let reply = assistant.ask("I need a watch for a gala").await.unwrap();
    assert_eq!(reply.role, ChatRole::Assistant);
    assert_eq!(reply.text, "The Elysium Chronograph is timeless.");
    assert_eq!(product_ids(&assistant), vec!["1"]);

    let messages = assistant.transcript().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text, "I need a watch for a gala");
}

#[tokio::test]
async fn test_prompt_carries_catalog_and_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(gemini_body(r#"{"message":"Noted."}"#)),
        )
        .mount(&server)
        .await;

    let client = GeminiClient::new("test-key").with_base_url(&server.uri());
    let mut assistant = assistant_for(client, "gemini-2.5-flash");
    assistant.ask("I love leather").await.unwrap();
    assistant.ask("Something for travel?").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let body: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("\"name\":\"Voyager Weekender\""));
    assert!(prompt.contains("History: User: I love leather\nAssistant: Noted.\nUser: Something for travel?"));
}

#[tokio::test]
async fn test_fenced_reply_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(
            "```json\n{\"message\":\"For the studio.\",\"recommendedProductIds\":[\"3\"]}\n```",
        )))
        .mount(&server)
        .await;

    let client = GeminiClient::new("test-key").with_base_url(&server.uri());
    let mut assistant = assistant_for(client, "gemini-2.5-flash");

    let reply = assistant.ask("camera please").await.unwrap();
    assert_eq!(reply.text, "For the studio.");
    assert_eq!(product_ids(&assistant), vec!["3"]);
}

#[tokio::test]
async fn test_server_error_then_retry_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(
            r#"{"message":"Back online.","recommendedProductIds":["4"]}"#,
        )))
        .mount(&server)
        .await;

    let client = GeminiClient::new("test-key").with_base_url(&server.uri());
    let mut assistant = assistant_for(client, "gemini-2.5-flash");

    let first = assistant.ask("a bag").await.unwrap();
    assert_eq!(first.text, FALLBACK_MESSAGE);
    assert!(first.products.is_empty());

    let second = assistant.ask("a bag, again").await.unwrap();
    assert_eq!(second.text, "Back online.");
    assert_eq!(product_ids(&assistant), vec!["4"]);
    assert_eq!(assistant.transcript().len(), 4);
}

#[tokio::test]
async fn test_unreachable_host_falls_back() {
    let client = GeminiClient::new("test-key").with_base_url("http://127.0.0.1:1");
    let mut assistant = assistant_for(client, "gemini-2.5-flash");

    let reply = assistant.ask("hello").await.unwrap();
    assert_eq!(reply.text, FALLBACK_MESSAGE);
    assert!(!assistant.is_busy());
}

#[tokio::test]
async fn test_non_json_reply_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_body("Certainly! I recommend the Elysium Chronograph.")),
        )
        .mount(&server)
        .await;

    let client = GeminiClient::new("test-key").with_base_url(&server.uri());
    let mut assistant = assistant_for(client, "gemini-2.5-flash");

    let reply = assistant.ask("watch?").await.unwrap();
    assert_eq!(reply.text, FALLBACK_MESSAGE);
}

#[tokio::test]
async fn test_status_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let client: ModelClient = GeminiClient::new("test-key").with_base_url(&server.uri()).into();
    let err = client.query_json("gemini-2.5-flash", "hi").await.unwrap_err();

    match err {
        ChatError::Status {
            provider,
            status,
            body,
        } => {
            assert_eq!(provider, Provider::Gemini);
            assert_eq!(status, 429);
            assert_eq!(body, "quota exceeded");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_openai_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "response_format": { "type": "json_object" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "{\"message\":\"Consider these.\",\"recommendedProductIds\":[\"5\",\"2\"]}"
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAIClient::new("sk-test").with_base_url(&server.uri());
    let mut assistant = assistant_for(client, "gpt-4o-mini");

    let reply = assistant.ask("gifts").await.unwrap();
    assert_eq!(reply.text, "Consider these.");
    assert_eq!(product_ids(&assistant), vec!["5", "2"]);
}

#[tokio::test]
async fn test_claude_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "claude-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [{
                "type": "text",
                "text": "{\"message\":\"A fine choice.\",\"recommendedProductIds\":[\"6\"]}"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ClaudeClient::new("claude-key").with_base_url(&server.uri());
    let mut assistant = assistant_for(client, "claude-sonnet-4-20250514");

    let reply = assistant.ask("luggage").await.unwrap();
    assert_eq!(reply.text, "A fine choice.");
    assert_eq!(product_ids(&assistant), vec!["6"]);
}

#[tokio::test]
async fn test_ollama_generate_and_tags() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "llama3.2:latest",
            "stream": false,
            "format": "json"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.2:latest",
            "response": "{\"message\":\"Local and lovely.\",\"recommendedProductIds\":[]}",
            "done": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "llama3.2:latest" }, { "name": "mistral:7b" }]
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&server.uri());
    assert_eq!(
        client.list_models().await.unwrap(),
        vec!["llama3.2:latest", "mistral:7b"]
    );

    let mut assistant = assistant_for(client, "llama3.2:latest");
    let reply = assistant.ask("anything local?").await.unwrap();
    assert_eq!(reply.text, "Local and lovely.");
    assert!(reply.products.is_empty());
}

#[tokio::test]
async fn test_background_turn_then_complete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(
            r#"{"message":"Here you are.","recommendedProductIds":["2"]}"#,
        )))
        .mount(&server)
        .await;

    let client = GeminiClient::new("test-key").with_base_url(&server.uri());
    let mut assistant = assistant_for(client, "gemini-2.5-flash");

    let turn = assistant.begin_turn("sporty watch").unwrap();
    assert!(assistant.is_busy());
    let handle = tokio::spawn(turn.send());
    let result = handle.await.unwrap();

    let reply = assistant.complete_turn(result);
    assert_eq!(reply.text, "Here you are.");
    assert!(!assistant.is_busy());
}

#[tokio::test]
async fn test_abandoned_ask_leaves_session_usable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_body(r#"{"message":"Too late."}"#))
                .set_delay(Duration::from_secs(2)),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(gemini_body(r#"{"message":"Right away."}"#)),
        )
        .mount(&server)
        .await;

    let client = GeminiClient::new("test-key").with_base_url(&server.uri());
    let mut assistant = assistant_for(client, "gemini-2.5-flash");

    let abandoned = tokio::time::timeout(Duration::from_millis(100), assistant.ask("first")).await;
    assert!(abandoned.is_err());
    assert!(assistant.transcript().is_empty());
    assert!(!assistant.is_busy());

    let reply = assistant.ask("second").await.unwrap();
    assert_eq!(reply.text, "Right away.");
    let messages = assistant.transcript().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text, "second");
}
