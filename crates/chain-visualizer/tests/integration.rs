//! Integration tests for the visualizer bridge
//!
//! Covers:
//! - Normalization of realistic chain outputs
//! - Readiness waiting against a mock server
//! - Value submission, retries and rejections

use chain_visualizer::{
    normalize, BridgeError, ChatGeneration, ChatResult, Converter, ConversionError,
    DictConvertible, FString, Generation, LlmResult, Message, Record, Value, VisualizerClient,
    VisualizerConfig,
};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a client pointed at the mock server
fn create_test_client(server: &MockServer) -> VisualizerClient {
    VisualizerClient::new(test_config(server)).expect("failed to create client")
}

fn test_config(server: &MockServer) -> VisualizerConfig {
    VisualizerConfig::builder()
        .host(server.address().ip().to_string())
        .port(server.address().port())
        .wait_time_ms(300)
        .poll_interval_ms(20)
        .max_retries(2)
        .initial_backoff_ms(10)
        .max_backoff_ms(50)
        .build()
        .expect("valid config")
}

#[derive(Debug)]
struct LlmChain {
    prompt: FString,
    memory: Vec<Message>,
}

impl DictConvertible for LlmChain {
    fn type_name(&self) -> &str {
        "LlmChain"
    }

    fn to_dict(&self) -> Result<Vec<(Value, Value)>, ConversionError> {
        Ok(vec![
            (Value::from("prompt"), Value::from(self.prompt.clone())),
            (Value::from("memory"), Value::from(self.memory.clone())),
            (
                Value::from("llm"),
                Value::from(Record::new("OpenAI").field("temperature", 0.0)),
            ),
        ])
    }

    fn has_memory(&self) -> bool {
        true
    }
}

#[test]
fn test_chain_object_normalizes_without_memory() {
    let chain = LlmChain {
        prompt: FString::new()
            .literal("Summarize: ")
            .interpolate("text", "a long story", "a long story"),
        memory: vec![Message::human("earlier turn"), Message::ai("earlier reply")],
    };

    let json = normalize(&Value::object(chain));

    assert_eq!(
        json,
        json!({
            "prompt": {"__fstring__": [
                "Summarize: ",
                {"formatted": "a long story", "source": "text", "value": "a long story"}
            ]},
            "memory": null,
            "llm": {"temperature": 0.0}
        })
    );
}

#[test]
fn test_trace_payload_with_mixed_results() {
    let payload = Value::map([
        (
            "completion",
            Value::from(LlmResult::new(vec![vec![Generation::new("hello")]])),
        ),
        (
            "chat",
            Value::from(ChatResult::new(vec![ChatGeneration::new(Message::ai("hi"))])),
        ),
        (
            "messages",
            Value::from(vec![Message::system("be brief"), Message::human("why?")]),
        ),
    ]);

    assert_eq!(
        normalize(&payload),
        json!({
            "completion": "hello",
            "chat": "hi",
            "messages": [{"System": "be brief"}, {"Human": "why?"}]
        })
    );
}

#[test]
fn test_serializable_structs_normalize_through_json() {
    #[derive(serde::Serialize)]
    struct Usage {
        prompt_tokens: u32,
        completion_tokens: u32,
    }

    let value = Value::from_serialize(&Usage {
        prompt_tokens: 12,
        completion_tokens: 30,
    })
    .unwrap();

    assert_eq!(
        normalize(&value),
        json!({"prompt_tokens": 12, "completion_tokens": 30})
    );
}

#[tokio::test]
async fn test_wait_until_running_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = create_test_client(&server);
    let polls = client.wait_until_running().await.unwrap();
    assert_eq!(polls, 1);
}

#[tokio::test]
async fn test_wait_until_running_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = create_test_client(&server);
    let err = client.wait_until_running().await.unwrap_err();

    assert!(matches!(err, BridgeError::Timeout { .. }));
    assert_eq!(err.to_string(), "Server didn't start within 0.3 seconds");
}

#[tokio::test]
async fn test_submit_posts_normalized_value() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/values"))
        .and(body_json(json!({"System": "go"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server);
    client
        .submit(&Value::from(Message::system("go")))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_submit_uses_injected_converter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/values"))
        .and(body_json(json!({"custom": true})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let converter: Converter = Arc::new(|_value: &Value| json!({"custom": true}));
    let client = VisualizerClient::with_converter(test_config(&server), converter).unwrap();

    client.submit(&Value::Int(1)).await.unwrap();
}

#[tokio::test]
async fn test_submit_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/values"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/values"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server);
    client.submit(&Value::from("payload")).await.unwrap();
}

#[tokio::test]
async fn test_submit_gives_up_after_max_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/values"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let client = create_test_client(&server);
    let err = client.submit(&Value::from("payload")).await.unwrap_err();

    assert!(matches!(err, BridgeError::Http(ref msg) if msg.contains("500")));
}

#[tokio::test]
async fn test_submit_rejection_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/values"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad shape"))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server);
    let err = client.submit(&Value::from("payload")).await.unwrap_err();

    match err {
        BridgeError::Rejected { status, body } => {
            assert_eq!(status, 422);
            assert_eq!(body, "bad shape");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

proptest! {
    #[test]
    fn prop_integers_pass_through(i in any::<i64>()) {
        prop_assert_eq!(normalize(&Value::Int(i)), json!(i));
    }

    #[test]
    fn prop_strings_pass_through(s in ".*") {
        prop_assert_eq!(normalize(&Value::from(s.clone())), json!(s));
    }

    #[test]
    fn prop_bools_pass_through(b in any::<bool>()) {
        prop_assert_eq!(normalize(&Value::Bool(b)), json!(b));
    }

    #[test]
    fn prop_finite_floats_pass_through(x in -1.0e300f64..1.0e300f64) {
        prop_assert_eq!(normalize(&Value::Float(x)), json!(x));
    }
}
