use lorebot_provider::{
    GenerationError, HuggingFaceGenerator, OpenAiCompatGenerator, TextGenerator,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.1";

#[tokio::test]
async fn huggingface_returns_generated_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/models/{MODEL}")))
        .and(header("authorization", "Bearer hf_test"))
        .and(body_partial_json(serde_json::json!({
            "inputs": "Question: hello\nAnswer:",
            "options": { "wait_for_model": true }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{ "generated_text": "Peace be upon you." }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let generator = HuggingFaceGenerator::new("hf_test", server.uri(), MODEL);
    let text = generator
        .generate("Question: hello\nAnswer:")
        .await
        .unwrap();
    assert_eq!(text, "Peace be upon you.");
}

#[tokio::test]
async fn huggingface_503_is_warming_up() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/models/{MODEL}")))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(serde_json::json!({ "error": "Model is currently loading" })),
        )
        .mount(&server)
        .await;

    let generator = HuggingFaceGenerator::new("hf_test", server.uri(), MODEL);
    let err = generator.generate("hi").await.unwrap_err();
    assert!(matches!(err, GenerationError::WarmingUp(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn huggingface_404_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such model"))
        .mount(&server)
        .await;

    let generator = HuggingFaceGenerator::new("hf_test", server.uri(), "missing/model");
    let err = generator.generate("hi").await.unwrap_err();
    assert!(matches!(err, GenerationError::NotFound(body) if body == "no such model"));
}

#[tokio::test]
async fn huggingface_empty_generation_is_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{}])))
        .mount(&server)
        .await;

    let generator = HuggingFaceGenerator::new("hf_test", server.uri(), MODEL);
    let err = generator.generate("hi").await.unwrap_err();
    assert!(matches!(err, GenerationError::Empty));
}

#[tokio::test]
async fn huggingface_without_key_makes_no_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let generator = HuggingFaceGenerator::new("", server.uri(), MODEL);
    let err = generator.generate("hi").await.unwrap_err();
    assert!(matches!(err, GenerationError::MissingApiKey));
}

#[tokio::test]
async fn openai_compat_reads_first_choice() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "messages": [{ "role": "user", "content": "hello" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "content": "Hello there" }, "finish_reason": "stop" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generator = OpenAiCompatGenerator::new("sk-test", server.uri(), "gpt-4o-mini");
    assert_eq!(generator.generate("hello").await.unwrap(), "Hello there");
}

#[tokio::test]
async fn openai_compat_rate_limit_is_retryable_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let generator = OpenAiCompatGenerator::new("sk-test", server.uri(), "gpt-4o-mini");
    let err = generator.generate("hello").await.unwrap_err();
    assert!(matches!(err, GenerationError::Api { status: 429, .. }));
    assert!(err.is_retryable());
}
