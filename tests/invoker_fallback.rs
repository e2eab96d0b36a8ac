use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use syllagen::gateway::openrouter::OpenRouterAdapter;
use syllagen::gateway::{Attribution, ChatModel, NoopUsageSink, ProviderGateway};
use syllagen::invoker::ModelInvoker;
use syllagen::stages::core_prompt;

const PRIMARY: &str = "meta-llama/llama-3.3-70b-instruct";
const FALLBACK: &str = "openai/gpt-4o-mini";

/// Responds based on which model the request asks for: the primary model
/// gets a 500, the fallback gets a good completion.
struct PrimaryDownResponder;

impl Respond for PrimaryDownResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).unwrap_or_default();

        if body["model"] == PRIMARY {
            ResponseTemplate::new(500).set_body_json(json!({
                "error": { "message": "provider overloaded", "code": "overloaded" }
            }))
        } else {
            ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": { "content": "{\"courseName\": \"Stats 200\"}" },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 50, "completion_tokens": 30 }
            }))
        }
    }
}

fn invoker_for(server: &MockServer) -> ModelInvoker {
    let adapter = OpenRouterAdapter::with_config(
        "sk-test",
        server.uri(),
        Duration::from_secs(5),
        None,
        None,
    )
    .unwrap();
    let gateway = Arc::new(ProviderGateway::new(adapter, Arc::new(NoopUsageSink)));
    ModelInvoker::new(
        gateway,
        ChatModel::openrouter(PRIMARY),
        ChatModel::openrouter(FALLBACK),
    )
}

#[tokio::test]
async fn falls_back_to_secondary_model_when_primary_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(PrimaryDownResponder)
        .mount(&server)
        .await;

    let content = invoker_for(&server)
        .invoke(&core_prompt("CHEM 101 syllabus text"), Attribution::new("test"))
        .await
        .unwrap();
    assert_eq!(content, "{\"courseName\": \"Stats 200\"}");

    // Exactly two attempts, primary first, fallback second, same messages.
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);

    let first: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    let second: serde_json::Value = serde_json::from_slice(&received[1].body).unwrap();
    assert_eq!(first["model"], PRIMARY);
    assert_eq!(second["model"], FALLBACK);
    assert_eq!(first["messages"], second["messages"]);
}

#[tokio::test]
async fn primary_success_never_touches_the_fallback() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "content": "{\"courseName\": \"Bio 101\"}" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 40, "completion_tokens": 25 }
        })))
        .mount(&server)
        .await;

    let content = invoker_for(&server)
        .invoke(&core_prompt("BIO 101 syllabus text"), Attribution::new("test"))
        .await
        .unwrap();
    assert_eq!(content, "{\"courseName\": \"Bio 101\"}");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["model"], PRIMARY);
}

#[tokio::test]
async fn both_models_failing_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "provider overloaded", "code": "overloaded" }
        })))
        .mount(&server)
        .await;

    let err = invoker_for(&server)
        .invoke(&core_prompt("PHYS 101 syllabus text"), Attribution::new("test"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "provider_error");

    // Primary then fallback, and nothing after the fallback fails.
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
    let first: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    let second: serde_json::Value = serde_json::from_slice(&received[1].body).unwrap();
    assert_eq!(first["model"], PRIMARY);
    assert_eq!(second["model"], FALLBACK);
}
