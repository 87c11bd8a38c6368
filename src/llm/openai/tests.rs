use super::*;
use crate::llm::ChatMessage;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn test_client(server_uri: &str, key_var: &str) -> OpenAiClient {
    // SAFETY: each test uses its own variable name, never read concurrently
    unsafe {
        std::env::set_var(key_var, "sk-test");
    }

    let config = Config {
        provider: crate::config::ProviderConfig {
            base_url: format!("{server_uri}/v1"),
            chat_model: "test-chat".to_string(),
            embedding_model: "test-embed".to_string(),
            api_key_env: key_var.to_string(),
        },
        ..Config::default()
    };

    OpenAiClient::new(&config).expect("can build client")
}

fn chat_response(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
}

struct EmbeddingsResponder;

impl Respond for EmbeddingsResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).expect("request body is JSON");
        let inputs = body["input"].as_array().map_or(0, Vec::len);

        // Deliberately emit entries in reverse order to exercise index sorting.
        let data: Vec<serde_json::Value> = (0..inputs)
            .rev()
            .map(|i| json!({"embedding": [i as f32, 1.0], "index": i}))
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({"data": data}))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_completion_returns_assistant_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_response("ciao!"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), "STUDYMATE_TEST_KEY_CHAT");
    let reply = tokio::task::spawn_blocking(move || client.complete("hello"))
        .await
        .expect("task completes")
        .expect("chat succeeds");

    assert_eq!(reply, "ciao!");
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_json_requests_json_object_format() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("json_object"))
        .respond_with(chat_response("{\"questions\": []}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), "STUDYMATE_TEST_KEY_JSON");
    let reply = tokio::task::spawn_blocking(move || {
        client.chat_json(&[ChatMessage::user("extract this")])
    })
    .await
    .expect("task completes")
    .expect("chat succeeds");

    assert_eq!(reply, "{\"questions\": []}");
}

#[tokio::test(flavor = "multi_thread")]
async fn embeddings_are_returned_in_input_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(EmbeddingsResponder)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), "STUDYMATE_TEST_KEY_EMBED");
    let texts = vec!["first".to_string(), "second".to_string(), "third".to_string()];
    let embeddings = tokio::task::spawn_blocking(move || client.embed_batch(&texts))
        .await
        .expect("task completes")
        .expect("embedding succeeds");

    assert_eq!(embeddings.len(), 3);
    for (i, embedding) in embeddings.iter().enumerate() {
        assert_eq!(embedding[0], i as f32);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_response("recovered"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), "STUDYMATE_TEST_KEY_RETRY").with_retry_attempts(2);
    let reply = tokio::task::spawn_blocking(move || client.complete("hello"))
        .await
        .expect("task completes")
        .expect("request recovers on retry");

    assert_eq!(reply, "recovered");
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), "STUDYMATE_TEST_KEY_401").with_retry_attempts(3);
    let result = tokio::task::spawn_blocking(move || client.complete("hello"))
        .await
        .expect("task completes");

    assert!(result.is_err());
}
