//! HTTP request handlers.
//!
//! Endpoint handlers for chat completions, model listings, health and
//! metrics. Request validation happens here on the raw JSON body, before
//! any provider is contacted, so malformed requests are rejected with a
//! clear message instead of a serde trace.

use crate::api::models::{ChatCompletionRequest, ChatCompletionResponse, ModelList};
use crate::api::streaming::{create_sse_stream, record_token_usage};
use crate::core::error::{GatewayError, Result};
use crate::core::ids::IdGenerator;
use crate::core::logging::{generate_request_id, PROVIDER_CONTEXT};
use crate::core::middleware::{ModelName, ProviderName};
use crate::services::{ProviderRegistry, ProviderRequest};
use crate::with_request_context;
use axum::{
    body::Body,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use prometheus::{Encoder, TextEncoder};
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProviderRegistry>,
    /// Injected so tests can pin completion ids to a known sequence.
    pub ids: Arc<dyn IdGenerator>,
}

impl AppState {
    pub fn new(registry: Arc<ProviderRegistry>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { registry, ids }
    }
}

/// Structural validation of a completion request.
///
/// Runs on the raw body before provider resolution; a request that fails
/// here never reaches a provider.
fn validate_completion_request(body: &Value) -> Result<()> {
    let model = body
        .get("model")
        .ok_or_else(|| GatewayError::InvalidRequest("'model' is required".to_string()))?;
    match model.as_str() {
        Some(m) if !m.is_empty() => {}
        _ => {
            return Err(GatewayError::InvalidRequest(
                "'model' must be a non-empty string".to_string(),
            ))
        }
    }

    let messages = body
        .get("messages")
        .ok_or_else(|| GatewayError::InvalidRequest("'messages' is required".to_string()))?;
    match messages.as_array() {
        Some(list) if !list.is_empty() => Ok(()),
        Some(_) => Err(GatewayError::InvalidRequest(
            "'messages' must be a non-empty array".to_string(),
        )),
        None => Err(GatewayError::InvalidRequest(
            "'messages' must be an array".to_string(),
        )),
    }
}

/// Handle chat completion requests.
///
/// Supports both streaming and non-streaming responses.
#[tracing::instrument(skip(state, body))]
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Response> {
    let request_id = generate_request_id();

    with_request_context!(request_id, async move {
        handle_completion(state, body).await
    })
}

async fn handle_completion(state: Arc<AppState>, body: Value) -> Result<Response> {
    validate_completion_request(&body)?;

    let request: ChatCompletionRequest =
        serde_json::from_value(body).map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
    let ChatCompletionRequest {
        model,
        messages,
        stream,
        extra,
    } = request;

    let (provider, provider_model) = state.registry.resolve(&model)?;
    let provider_name = provider.name().to_string();

    PROVIDER_CONTEXT
        .scope(provider_name.clone(), async move {
            tracing::debug!(model = %model, stream, "Processing chat completion request");

            let provider_request = ProviderRequest {
                model: provider_model,
                messages,
                params: extra,
            };

            let mut response = if stream {
                let upstream = provider.complete_stream(provider_request).await?;
                create_sse_stream(
                    upstream,
                    state.ids.next_id(),
                    Utc::now().timestamp(),
                    model.clone(),
                    provider_name.clone(),
                )
            } else {
                let completion = provider.complete(provider_request).await?;
                if let Some(usage) = &completion.usage {
                    record_token_usage(usage, &model, &provider_name);
                }
                let body = ChatCompletionResponse::new(
                    state.ids.next_id(),
                    Utc::now().timestamp(),
                    model.clone(),
                    completion.content,
                    completion.finish_reason,
                    completion.usage,
                );
                Json(body).into_response()
            };

            // Label source for the metrics middleware.
            response.extensions_mut().insert(ModelName(model));
            response
                .extensions_mut()
                .insert(ProviderName(provider_name));
            Ok(response)
        })
        .await
}

/// List models from every registered provider.
pub async fn list_models(State(state): State<Arc<AppState>>) -> Result<Json<ModelList>> {
    let list = state.registry.aggregate_models().await?;
    tracing::debug!(count = list.data.len(), "Listed models");
    Ok(Json(list))
}

/// Liveness probe with the registered provider inventory.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let provider_info: Vec<Value> = state
        .registry
        .providers()
        .iter()
        .map(|p| json!({ "name": p.name(), "type": p.kind() }))
        .collect();

    Json(json!({
        "status": "ok",
        "providers": provider_info.len(),
        "provider_info": provider_info,
    }))
}

/// Prometheus metrics in text exposition format.
pub async fn metrics_handler() -> Result<Response> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", encoder.format_type())
        .body(Body::from(buffer))
        .unwrap())
}
