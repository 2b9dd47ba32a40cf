//! Integration tests for the gateway server.
//!
//! These tests drive the full router end to end with the built-in echo
//! provider: completion responses, streaming framing, validation errors,
//! model listing and the operational endpoints.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::{get, post},
    Router,
};
use llm_gateway_rust::{
    api::{chat_completions, health, list_models, metrics_handler, AppState},
    core::{ids::SequentialIds, init_metrics, MetricsMiddleware},
    services::{EchoProvider, ProviderRegistry},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create a test application over the given registry, with deterministic
/// completion ids (chatcmpl-1, chatcmpl-2, ...).
fn create_test_app(registry: ProviderRegistry) -> Router {
    init_metrics();

    let state = Arc::new(AppState::new(
        Arc::new(registry),
        Arc::new(SequentialIds::new()),
    ));

    Router::new()
        .route("/chat/completions", post(chat_completions))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/models", get(list_models))
        .route("/v1/models", get(list_models))
        .layer(axum::middleware::from_fn(MetricsMiddleware::track_metrics))
        .route("/health", get(health))
        .with_state(state)
        .route("/metrics", get(metrics_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// App with a single echo provider registered as `demo`.
fn echo_app() -> Router {
    let mut registry = ProviderRegistry::new();
    registry
        .register(Arc::new(EchoProvider::new("demo".to_string(), vec![])))
        .unwrap();
    create_test_app(registry)
}

fn completion_request(body: Value) -> Request<Body> {
    Request::builder()
        .uri("/chat/completions")
        .method("POST")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn test_chat_completion_echoes_last_user_message() {
    let app = echo_app();

    let response = app
        .oneshot(completion_request(json!({
            "model": "demo:echo",
            "messages": [{"role": "user", "content": "Hello, gateway"}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["object"], "chat.completion");
    assert_eq!(json["id"], "chatcmpl-1");
    assert_eq!(json["model"], "demo:echo");
    assert_eq!(json["choices"][0]["index"], 0);
    assert_eq!(json["choices"][0]["message"]["role"], "assistant");
    assert_eq!(json["choices"][0]["message"]["content"], "Hello, gateway");
    assert_eq!(json["choices"][0]["finish_reason"], "stop");
    // The echo provider reports no usage, so none may appear.
    assert!(json.get("usage").is_none());
}

#[tokio::test]
async fn test_completion_ids_come_from_injected_generator() {
    let app = echo_app();

    for expected in ["chatcmpl-1", "chatcmpl-2", "chatcmpl-3"] {
        let response = app
            .clone()
            .oneshot(completion_request(json!({
                "model": "demo:echo",
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["id"], expected);
    }
}

#[tokio::test]
async fn test_missing_model_returns_400() {
    let app = echo_app();

    let response = app
        .oneshot(completion_request(json!({
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_empty_model_returns_400_with_error_field() {
    let app = echo_app();

    let response = app
        .oneshot(completion_request(json!({
            "model": "",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json.get("error").is_some());
    assert!(json["error"].as_str().unwrap().contains("model"));
}

#[tokio::test]
async fn test_unregistered_provider_returns_400() {
    let app = echo_app();

    let response = app
        .oneshot(completion_request(json!({
            "model": "ghost:some-model",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("ghost"));
}

#[tokio::test]
async fn test_model_without_separator_returns_400() {
    let app = echo_app();

    let response = app
        .oneshot(completion_request(json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_messages_returns_400() {
    let app = echo_app();

    let response = app
        .oneshot(completion_request(json!({
            "model": "demo:echo",
            "messages": []
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_array_messages_returns_400() {
    let app = echo_app();

    let response = app
        .oneshot(completion_request(json!({
            "model": "demo:echo",
            "messages": "not a list"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_json_request_returns_400() {
    let app = echo_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/chat/completions")
                .method("POST")
                .header("Content-Type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_streaming_two_deltas_yields_three_chunks_then_done() {
    let app = echo_app();

    let response = app
        .oneshot(completion_request(json!({
            "model": "demo:echo",
            "messages": [{"role": "user", "content": "alpha beta"}],
            "stream": true
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    let text = body_text(response).await;
    let frames: Vec<&str> = text.split("\n\n").filter(|f| !f.is_empty()).collect();

    // Two content increments, one terminal chunk, then the end marker.
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[3], "data: [DONE]");

    let first: Value = serde_json::from_str(frames[0].strip_prefix("data: ").unwrap()).unwrap();
    assert_eq!(first["object"], "chat.completion.chunk");
    assert_eq!(first["choices"][0]["delta"]["role"], "assistant");
    assert_eq!(first["choices"][0]["delta"]["content"], "alpha");
    assert_eq!(first["choices"][0]["finish_reason"], Value::Null);

    let second: Value = serde_json::from_str(frames[1].strip_prefix("data: ").unwrap()).unwrap();
    assert_eq!(second["choices"][0]["delta"]["content"], " beta");

    let terminal: Value = serde_json::from_str(frames[2].strip_prefix("data: ").unwrap()).unwrap();
    assert_eq!(terminal["choices"][0]["delta"], json!({}));
    assert_eq!(terminal["choices"][0]["finish_reason"], "stop");

    // All chunks of one stream share id, created and model.
    for frame in &frames[..3] {
        let chunk: Value = serde_json::from_str(frame.strip_prefix("data: ").unwrap()).unwrap();
        assert_eq!(chunk["id"], "chatcmpl-1");
        assert_eq!(chunk["model"], "demo:echo");
        assert_eq!(chunk["created"], first["created"]);
    }
}

#[tokio::test]
async fn test_streaming_reconstructs_full_reply() {
    let app = echo_app();

    let response = app
        .oneshot(completion_request(json!({
            "model": "demo:echo",
            "messages": [{"role": "user", "content": "one two three"}],
            "stream": true
        })))
        .await
        .unwrap();

    let text = body_text(response).await;
    let mut reply = String::new();
    for frame in text.split("\n\n").filter(|f| !f.is_empty()) {
        let data = frame.strip_prefix("data: ").unwrap();
        if data == "[DONE]" {
            continue;
        }
        let chunk: Value = serde_json::from_str(data).unwrap();
        if let Some(content) = chunk["choices"][0]["delta"]["content"].as_str() {
            reply.push_str(content);
        }
    }

    assert_eq!(reply, "one two three");
}

#[tokio::test]
async fn test_structured_message_content_passes_through() {
    let app = echo_app();

    let response = app
        .oneshot(completion_request(json!({
            "model": "demo:echo",
            "messages": [{"role": "user", "content": [{"text": "hi", "type": "text"}]}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    // The echo provider renders non-string content as raw JSON, which
    // shows the content arrived unmodified.
    assert_eq!(
        json["choices"][0]["message"]["content"],
        r#"[{"text":"hi","type":"text"}]"#
    );
}

#[tokio::test]
async fn test_unknown_request_fields_are_tolerated() {
    let app = echo_app();

    let response = app
        .oneshot(completion_request(json!({
            "model": "demo:echo",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.2,
            "max_tokens": 128,
            "top_p": 0.9
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_models_endpoint_lists_in_registration_order() {
    let mut registry = ProviderRegistry::new();
    registry
        .register(Arc::new(EchoProvider::new(
            "beta".to_string(),
            vec!["zeta".to_string(), "alpha-model".to_string()],
        )))
        .unwrap();
    registry
        .register(Arc::new(EchoProvider::new(
            "alpha".to_string(),
            vec!["m1".to_string()],
        )))
        .unwrap();
    let app = create_test_app(registry);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/models")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["object"], "list");

    let ids: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();

    // Registration order, not alphabetical.
    assert_eq!(ids, vec!["beta:zeta", "beta:alpha-model", "alpha:m1"]);

    let first = &json["data"][0];
    assert_eq!(first["object"], "model");
    assert_eq!(first["owned_by"], "beta");
    assert!(first["created"].as_i64().unwrap() > 1_700_000_000);
}

#[tokio::test]
async fn test_models_listing_is_idempotent() {
    let mut registry = ProviderRegistry::new();
    registry
        .register(Arc::new(EchoProvider::new(
            "demo".to_string(),
            vec!["echo".to_string(), "reverse".to_string()],
        )))
        .unwrap();
    let app = create_test_app(registry);

    let mut id_sets = Vec::new();
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/models")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let json = body_json(response).await;
        let mut ids: Vec<String> = json["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap().to_string())
            .collect();
        ids.sort();
        id_sets.push(ids);
    }

    // `created` may drift between calls, the id set may not.
    assert_eq!(id_sets[0], id_sets[1]);
}

#[tokio::test]
async fn test_every_listed_model_resolves() {
    let mut registry = ProviderRegistry::new();
    registry
        .register(Arc::new(EchoProvider::new(
            "demo".to_string(),
            vec!["echo".to_string()],
        )))
        .unwrap();
    registry
        .register(Arc::new(EchoProvider::new(
            "mirror".to_string(),
            vec!["plain".to_string(), "verbose:v2".to_string()],
        )))
        .unwrap();
    let app = create_test_app(registry);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/models")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    let ids: Vec<String> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 3);

    // Every listed id must be usable as-is in a completion request.
    for id in ids {
        let response = app
            .clone()
            .oneshot(completion_request(json!({
                "model": id.as_str(),
                "messages": [{"role": "user", "content": "ping"}]
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK, "model id {:?}", id);
    }
}

#[tokio::test]
async fn test_models_endpoint_with_v1_prefix() {
    let app = echo_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/models")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"][0]["id"], "demo:echo");
}

#[tokio::test]
async fn test_chat_completions_with_v1_prefix() {
    let app = echo_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/chat/completions")
                .method("POST")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({
                        "model": "demo:echo",
                        "messages": [{"role": "user", "content": "hi"}]
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = echo_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["providers"], 1);
    assert_eq!(json["provider_info"][0]["name"], "demo");
    assert_eq!(json["provider_info"][0]["type"], "echo");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_gateway_metrics() {
    let app = echo_app();

    // Drive one completion through the middleware first.
    let _ = app
        .clone()
        .oneshot(completion_request(json!({
            "model": "demo:echo",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;
    assert!(text.contains("llm_gateway_requests_total"));
    assert!(text.contains("# HELP") && text.contains("# TYPE"));
}

#[tokio::test]
async fn test_cors_headers_present() {
    let app = echo_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/models")
                .header("Origin", "http://example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_not_found_endpoint() {
    let app = echo_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_concurrent_completion_requests() {
    let app = echo_app();

    let mut handles = vec![];
    for i in 0..10 {
        let app_clone = app.clone();
        handles.push(tokio::spawn(async move {
            let response = app_clone
                .oneshot(completion_request(json!({
                    "model": "demo:echo",
                    "messages": [{"role": "user", "content": format!("request {}", i)}]
                })))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            // Each request gets its own echo back, never a neighbor's.
            assert_eq!(
                json["choices"][0]["message"]["content"],
                format!("request {}", i)
            );
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
}
