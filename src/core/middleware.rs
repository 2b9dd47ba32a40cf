//! HTTP middleware for request tracking.
//!
//! Records per-request metrics (count, duration, in-flight gauge) and
//! emits one summary log line per request. Handlers attach the resolved
//! model and provider to the response extensions so the middleware can
//! label metrics with them.

use crate::core::metrics::get_metrics;
use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Extension type for storing model name in response
#[derive(Clone, Debug)]
pub struct ModelName(pub String);

/// Extension type for storing provider name in response
#[derive(Clone, Debug)]
pub struct ProviderName(pub String);

/// Known client patterns for User-Agent mapping
/// Each tuple: (pattern to match in UA, normalized client name)
/// Order matters - more specific patterns should come first
const CLIENT_PATTERNS: &[(&str, &str)] = &[
    // OpenAI SDKs
    ("OpenAI/JS", "openai-js"),
    ("openai-python", "openai-python"),
    ("OpenAI-Python", "openai-python"),
    ("openai-node", "openai-node"),
    ("OpenAI-Node", "openai-node"),
    ("openai/", "openai-sdk"),
    ("OpenAI/", "openai-sdk"),
    // Frameworks
    ("langchain", "langchain"),
    ("LangChain", "langchain"),
    ("llama-index", "llama-index"),
    ("ai-sdk", "ai-sdk"),
    // API testing tools
    ("PostmanRuntime", "postman"),
    ("insomnia", "insomnia"),
    // Common HTTP clients
    ("python-httpx", "python-httpx"),
    ("python-requests", "python-requests"),
    ("httpx", "httpx"),
    ("axios", "axios"),
    ("node-fetch", "node-fetch"),
    ("curl", "curl"),
    ("wget", "wget"),
    // Browsers (low priority - usually not direct API calls)
    ("Mozilla", "browser"),
];

/// Extract normalized client name from User-Agent header
pub fn extract_client(headers: &HeaderMap) -> String {
    let raw = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if raw.is_empty() {
        return "unknown".to_string();
    }

    for (pattern, client_name) in CLIENT_PATTERNS {
        if raw.contains(pattern) {
            return client_name.to_string();
        }
    }

    // Fallback: extract first token (before space or slash) and truncate to 30 chars
    let first_token = raw
        .split(|c: char| c == ' ' || c == '/')
        .next()
        .unwrap_or(raw);

    let cleaned: String = first_token
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
        .take(30)
        .collect();

    if cleaned.is_empty() {
        "other".to_string()
    } else {
        cleaned
    }
}

/// Middleware for tracking request metrics.
pub struct MetricsMiddleware;

impl MetricsMiddleware {
    /// Track metrics for incoming requests.
    ///
    /// This middleware:
    /// - Increments active request counter
    /// - Measures request duration
    /// - Records request count by status code
    /// - Logs request details
    pub async fn track_metrics(request: Request, next: Next) -> Response {
        let endpoint = request.uri().path().to_string();
        let method = request.method().to_string();
        let client = extract_client(request.headers());

        // Skip metrics endpoint itself to avoid recursion
        if endpoint == "/metrics" {
            return next.run(request).await;
        }

        let metrics = get_metrics();

        metrics
            .active_requests
            .with_label_values(&[&endpoint])
            .inc();

        let start = Instant::now();

        let response = next.run(request).await;

        let duration = start.elapsed().as_secs_f64();
        let status_code = response.status().as_u16().to_string();

        // Model and provider come from response extensions (set by handlers)
        let model = response
            .extensions()
            .get::<ModelName>()
            .map(|m| m.0.as_str())
            .unwrap_or("unknown");
        let provider = response
            .extensions()
            .get::<ProviderName>()
            .map(|p| p.0.as_str())
            .unwrap_or("unknown");

        // Record completion metrics only where a provider was resolved;
        // /models and /health don't carry one.
        if provider != "unknown" {
            metrics
                .request_count
                .with_label_values(&[
                    &method,
                    &endpoint,
                    model,
                    provider,
                    &status_code,
                    client.as_str(),
                ])
                .inc();

            metrics
                .request_duration
                .with_label_values(&[&method, &endpoint, model, provider, client.as_str()])
                .observe(duration);
        }

        let is_streaming = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("text/event-stream"))
            .unwrap_or(false);

        let is_completion_endpoint =
            endpoint == "/chat/completions" || endpoint == "/v1/chat/completions";
        if is_completion_endpoint {
            // For streaming responses, duration is actually TTFB (time to first byte)
            // since next.run() returns when headers are ready, not when body is complete
            if is_streaming {
                tracing::info!(
                    "{} {} - status={} client={} model={} provider={} ttfb={:.3}s",
                    method,
                    endpoint,
                    status_code,
                    client,
                    model,
                    provider,
                    duration
                );
            } else {
                tracing::info!(
                    "{} {} - status={} client={} model={} provider={} duration={:.3}s",
                    method,
                    endpoint,
                    status_code,
                    client,
                    model,
                    provider,
                    duration
                );
            }
        } else {
            tracing::info!(
                "{} {} - status={} duration={:.3}s",
                method,
                endpoint,
                status_code,
                duration
            );
        }

        metrics
            .active_requests
            .with_label_values(&[&endpoint])
            .dec();

        response
    }
}
