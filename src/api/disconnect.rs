//! Client disconnect detection for streaming responses.
//!
//! Axum drops the response body stream when the client goes away, so the
//! drop of this wrapper is the disconnect signal for the producer side.

use crate::core::metrics::get_metrics;
use crate::core::StreamCancelHandle;
use axum::body::Bytes;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A stream wrapper that triggers a cancellation handle when dropped.
pub struct DisconnectStream<S> {
    pub stream: S,
    pub cancel_handle: StreamCancelHandle,
    pub provider: String,
}

impl<S, E> Stream for DisconnectStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.stream).poll_next(cx)
    }
}

impl<S> Drop for DisconnectStream<S> {
    fn drop(&mut self) {
        // A drop before the terminal frame went out means the client
        // disconnected; `cancel` is a no-op after normal completion.
        if !self.cancel_handle.is_completed() {
            get_metrics()
                .stream_disconnects
                .with_label_values(&[&self.provider])
                .inc();
            tracing::warn!(
                provider = %self.provider,
                "Client disconnected before stream completion"
            );
        }
        self.cancel_handle.cancel();
    }
}
