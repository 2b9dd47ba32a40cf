//! Provider abstraction for chat completion backends.
//!
//! Every backend the gateway can route to implements [`ChatProvider`]. The
//! registry stores providers as trait objects, so a request only ever sees
//! the provider-local model name and the normalized request shape defined
//! here.

use async_trait::async_trait;
use futures::stream::Stream;
use std::collections::HashMap;
use std::pin::Pin;

use crate::api::models::{Message, Usage};
use crate::core::error::Result;

/// Request forwarded to a provider after model resolution.
///
/// The `model` field holds the provider-local name, with the provider prefix
/// already stripped. Parameters the gateway does not interpret are carried
/// in `params` untouched.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub params: HashMap<String, serde_json::Value>,
}

/// Completed (non-streaming) provider response.
///
/// `usage` is `None` whenever the provider did not report token counts; the
/// gateway never substitutes estimated numbers.
#[derive(Debug, Clone)]
pub struct ProviderCompletion {
    pub content: String,
    pub finish_reason: String,
    pub usage: Option<Usage>,
}

/// A single increment of a streaming completion.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// A piece of assistant text produced by the provider.
    Delta(String),
    /// The provider finished generating. Always the final event of a stream.
    Done {
        finish_reason: String,
        usage: Option<Usage>,
    },
}

/// Stream of provider events, pulled one at a time by the gateway.
pub type ProviderEventStream = Pin<Box<dyn Stream<Item = Result<ProviderEvent>> + Send>>;

/// Interface implemented by every completion backend.
///
/// Implementations must be cheap to clone behind an `Arc` and safe to call
/// concurrently; the registry hands the same instance to every request.
#[async_trait]
pub trait ChatProvider: Send + Sync + std::fmt::Debug {
    /// Registered provider name, used as the prefix of composite model ids.
    fn name(&self) -> &str;

    /// Short provider type label for logs ("echo", "openai").
    fn kind(&self) -> &'static str;

    /// List the provider-local model names this provider serves.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing catalog cannot be queried. The
    /// registry treats this as a degraded listing, not a fatal condition.
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Run a full completion and return the assembled response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderCompletion>;

    /// Start a streaming completion.
    ///
    /// The returned stream yields zero or more [`ProviderEvent::Delta`]
    /// items followed by exactly one [`ProviderEvent::Done`]. Errors that
    /// occur before any bytes are produced surface as the method's own
    /// error; errors after that point arrive through the stream.
    async fn complete_stream(&self, request: ProviderRequest) -> Result<ProviderEventStream>;
}
