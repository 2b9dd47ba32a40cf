//! Server-Sent Events (SSE) streaming for chat completions.
//!
//! Converts a provider's event stream into OpenAI chunk framing: one
//! chunk per provider delta, then a terminal chunk carrying the finish
//! reason, then the `[DONE]` marker. A bounded channel of capacity one
//! sits between the provider pump and the HTTP body, so the gateway
//! never runs ahead of the client by more than a single chunk.

use axum::body::{Body, Bytes};
use axum::response::Response as AxumResponse;
use futures::stream::StreamExt;
use tokio::sync::mpsc;

use crate::api::disconnect::DisconnectStream;
use crate::api::models::{StreamChunk, Usage};
use crate::core::error::{GatewayError, Result};
use crate::core::metrics::get_metrics;
use crate::core::sse::{format_sse_data, format_sse_done};
use crate::core::StreamCancelHandle;
use crate::services::{ProviderEvent, ProviderEventStream};

/// Build the SSE response for a streaming completion.
///
/// The provider stream is consumed by a spawned pump task; the response
/// body pulls frames from the pump through a capacity-one channel.
/// Dropping the body (client disconnect) cancels the pump, which in turn
/// drops the upstream connection.
pub fn create_sse_stream(
    upstream: ProviderEventStream,
    id: String,
    created: i64,
    model: String,
    provider: String,
) -> AxumResponse {
    let cancel_handle = StreamCancelHandle::new();
    let (tx, mut rx) = mpsc::channel::<Result<Bytes>>(1);

    tokio::spawn(pump_provider_events(
        upstream,
        tx,
        cancel_handle.clone(),
        id,
        created,
        model,
        provider.clone(),
    ));

    let frames = Box::pin(async_stream::stream! {
        while let Some(frame) = rx.recv().await {
            yield frame;
        }
    });

    let guarded = DisconnectStream {
        stream: frames,
        cancel_handle,
        provider,
    };

    AxumResponse::builder()
        .status(200)
        .header("Content-Type", "text/event-stream")
        .header("Cache-Control", "no-cache")
        .header("Connection", "keep-alive")
        .body(Body::from_stream(guarded))
        .unwrap()
}

/// Drive the provider stream and feed SSE frames into the channel.
///
/// Every `send` awaits channel capacity, so the provider is only pulled
/// as fast as the client reads. Cancellation (fired by the response body
/// drop) wins the select and ends the task, which drops the upstream
/// stream and aborts the provider call.
async fn pump_provider_events(
    mut upstream: ProviderEventStream,
    tx: mpsc::Sender<Result<Bytes>>,
    cancel_handle: StreamCancelHandle,
    id: String,
    created: i64,
    model: String,
    provider: String,
) {
    let mut first = true;

    loop {
        tokio::select! {
            _ = cancel_handle.cancelled() => {
                tracing::debug!(provider = %provider, "Stream cancelled, dropping upstream connection");
                return;
            }
            event = upstream.next() => match event {
                Some(Ok(ProviderEvent::Delta(text))) => {
                    let chunk = StreamChunk::delta(&id, created, &model, first, text);
                    first = false;
                    if !send_chunk(&tx, &chunk).await {
                        return;
                    }
                }
                Some(Ok(ProviderEvent::Done { finish_reason, usage })) => {
                    if let Some(usage) = &usage {
                        record_token_usage(usage, &model, &provider);
                    }
                    let chunk = StreamChunk::terminal(&id, created, &model, finish_reason, usage);
                    if send_chunk(&tx, &chunk).await {
                        let _ = tx.send(Ok(Bytes::from(format_sse_done()))).await;
                    }
                    cancel_handle.mark_completed();
                    return;
                }
                Some(Err(e)) => {
                    tracing::error!(
                        provider = %provider,
                        error = %e,
                        "Upstream stream failed mid-flight"
                    );
                    close_with_error(&tx, &cancel_handle, &id, created, &model).await;
                    return;
                }
                None => {
                    // Providers end with an explicit Done; a silent end is
                    // a broken contract and closes the stream the same way.
                    tracing::error!(
                        provider = %provider,
                        "Upstream stream ended without a terminal event"
                    );
                    close_with_error(&tx, &cancel_handle, &id, created, &model).await;
                    return;
                }
            }
        }
    }
}

/// Close a failed stream in valid SSE framing.
///
/// The headers are already on the wire, so a status code can no longer
/// signal the failure. Emit a terminal chunk with finish reason `error`
/// followed by `[DONE]` instead of leaving the client hanging.
async fn close_with_error(
    tx: &mpsc::Sender<Result<Bytes>>,
    cancel_handle: &StreamCancelHandle,
    id: &str,
    created: i64,
    model: &str,
) {
    let chunk = StreamChunk::terminal(id, created, model, "error".to_string(), None);
    if send_chunk(tx, &chunk).await {
        let _ = tx.send(Ok(Bytes::from(format_sse_done()))).await;
    }
    cancel_handle.mark_completed();
}

/// Serialize a chunk into an SSE data frame and send it.
///
/// Returns false when the receiver is gone (client disconnected).
async fn send_chunk(tx: &mpsc::Sender<Result<Bytes>>, chunk: &StreamChunk) -> bool {
    let frame = match serde_json::to_string(chunk) {
        Ok(json) => format_sse_data(&json),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize stream chunk");
            let _ = tx.send(Err(GatewayError::Serialization(e))).await;
            return false;
        }
    };
    tx.send(Ok(Bytes::from(frame))).await.is_ok()
}

/// Record provider-reported token usage.
///
/// Usage is only ever recorded, never computed: when a provider does not
/// report it, the counters simply do not move.
pub(crate) fn record_token_usage(usage: &Usage, model: &str, provider: &str) {
    let metrics = get_metrics();

    metrics
        .token_usage
        .with_label_values(&[model, provider, "prompt"])
        .inc_by(u64::from(usage.prompt_tokens));
    metrics
        .token_usage
        .with_label_values(&[model, provider, "completion"])
        .inc_by(u64::from(usage.completion_tokens));
    metrics
        .token_usage
        .with_label_values(&[model, provider, "total"])
        .inc_by(u64::from(usage.total_tokens));

    tracing::debug!(
        model = %model,
        provider = %provider,
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        total_tokens = usage.total_tokens,
        "Recorded token usage"
    );
}
