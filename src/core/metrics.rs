//! Prometheus metrics collection.
//!
//! All metrics live in a process-wide registry initialized once at
//! startup; `GET /metrics` serves the text exposition format.

use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter_vec, GaugeVec, HistogramVec,
    IntCounterVec,
};
use std::sync::OnceLock;

/// Container for all application metrics.
pub struct Metrics {
    /// Total requests by method, endpoint, model, provider and status
    pub request_count: IntCounterVec,

    /// Request duration in seconds
    pub request_duration: HistogramVec,

    /// Requests currently in flight per endpoint
    pub active_requests: GaugeVec,

    /// Token usage as reported by providers (never computed locally)
    pub token_usage: IntCounterVec,

    /// Streaming responses dropped by the client before completion
    pub stream_disconnects: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Initialize the global metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() -> &'static Metrics {
    METRICS.get_or_init(|| Metrics {
        request_count: register_int_counter_vec!(
            "llm_gateway_requests_total",
            "Total number of requests processed",
            &["method", "endpoint", "model", "provider", "status", "client"]
        )
        .expect("Failed to register request_count metric"),

        request_duration: register_histogram_vec!(
            "llm_gateway_request_duration_seconds",
            "Request duration in seconds",
            &["method", "endpoint", "model", "provider", "client"],
            vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]
        )
        .expect("Failed to register request_duration metric"),

        active_requests: register_gauge_vec!(
            "llm_gateway_active_requests",
            "Number of requests currently being processed",
            &["endpoint"]
        )
        .expect("Failed to register active_requests metric"),

        token_usage: register_int_counter_vec!(
            "llm_gateway_token_usage_total",
            "Token usage reported by providers",
            &["model", "provider", "type"]
        )
        .expect("Failed to register token_usage metric"),

        stream_disconnects: register_int_counter_vec!(
            "llm_gateway_stream_disconnects_total",
            "Streaming responses dropped by the client before completion",
            &["provider"]
        )
        .expect("Failed to register stream_disconnects metric"),
    })
}

/// Get the global metrics instance.
///
/// Panics if `init_metrics` has not been called.
pub fn get_metrics() -> &'static Metrics {
    METRICS
        .get()
        .expect("Metrics not initialized. Call init_metrics() first.")
}
