#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Tests for the LLM provider clients and fallback against mock HTTP servers.

use kb_rag::RagError;
use kb_rag::config::LlmConfig;
use kb_rag::llm::{GeminiProvider, LlmProvider, LlmService, OpenAiProvider};
use kb_rag::store::{ChunkMetadata, QueryResult};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn llm_config() -> LlmConfig {
    LlmConfig {
        gemini_api_key: "g-test-key".to_string(),
        openai_api_key: "sk-test-key".to_string(),
        ..LlmConfig::default()
    }
}

fn retrieved(text: &str) -> QueryResult {
    QueryResult {
        text: text.to_string(),
        metadata: ChunkMetadata {
            source: "spec.pdf".to_string(),
            page: 1,
            chunk_index: 0,
        },
        score: 0.95,
    }
}

async fn run_blocking<T: Send + 'static>(
    f: impl FnOnce() -> T + Send + 'static,
) -> T {
    tokio::task::spawn_blocking(f)
        .await
        .expect("blocking task panicked")
}

#[tokio::test(flavor = "multi_thread")]
async fn gemini_generate_parses_candidate_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "  The motor draws 5A.  " }] }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(&llm_config()).with_base_url(server.uri());
    let answer = run_blocking(move || provider.generate("system", "user"))
        .await
        .expect("generate failed");

    assert_eq!(answer, "The motor draws 5A.");
}

#[tokio::test(flavor = "multi_thread")]
async fn gemini_empty_candidates_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(&llm_config()).with_base_url(server.uri());
    let result = run_blocking(move || provider.generate("system", "user")).await;

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn openai_generate_sends_bearer_token_and_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                { "role": "system", "content": "system prompt" },
                { "role": "user", "content": "user prompt" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "An answer." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(&llm_config()).with_base_url(server.uri());
    let answer = run_blocking(move || provider.generate("system prompt", "user prompt"))
        .await
        .expect("generate failed");

    assert_eq!(answer, "An answer.");
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_primary_falls_back_to_secondary_over_http() {
    let gemini_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&gemini_server)
        .await;

    let openai_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "backup answer" } }]
        })))
        .expect(1)
        .mount(&openai_server)
        .await;

    let config = llm_config();
    let service = LlmService::from_providers(vec![
        Box::new(GeminiProvider::new(&config).with_base_url(gemini_server.uri())),
        Box::new(OpenAiProvider::new(&config).with_base_url(openai_server.uri())),
    ]);

    let result = run_blocking(move || {
        service.generate_answer("What is the motor current?", &[retrieved("ctx")], None)
    })
    .await
    .expect("fallback should succeed");

    assert_eq!(result.answer, "backup answer");
    assert_eq!(result.references, vec!["ctx".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn all_backends_failing_surfaces_the_last_provider() {
    let gemini_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&gemini_server)
        .await;

    let openai_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&openai_server)
        .await;

    let config = llm_config();
    let service = LlmService::from_providers(vec![
        Box::new(GeminiProvider::new(&config).with_base_url(gemini_server.uri())),
        Box::new(OpenAiProvider::new(&config).with_base_url(openai_server.uri())),
    ]);

    let result = run_blocking(move || {
        service.generate_answer("q", &[retrieved("ctx")], None)
    })
    .await;

    match result {
        Err(RagError::AllProvidersFailed { provider, .. }) => {
            assert_eq!(provider, "openai");
        }
        other => panic!(
            "expected AllProvidersFailed, got {:?}",
            other.map(|a| a.answer)
        ),
    }
}

#[test]
fn availability_reflects_credential_presence() {
    let mut config = llm_config();
    config.openai_api_key = String::new();

    let gemini = GeminiProvider::new(&config);
    let openai = OpenAiProvider::new(&config);

    assert!(gemini.is_available());
    assert!(!openai.is_available());
}
