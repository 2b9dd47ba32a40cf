//! Built-in echo provider.
//!
//! Serves completions entirely in process by repeating the caller's last
//! user message back as the assistant reply. Registered as `demo` by
//! default so the gateway answers requests without any upstream
//! configuration.

use async_stream::stream;
use async_trait::async_trait;

use crate::api::models::Message;
use crate::core::error::Result;
use crate::services::provider::{
    ChatProvider, ProviderCompletion, ProviderEvent, ProviderEventStream, ProviderRequest,
};

const DEFAULT_MODEL: &str = "echo";
const FINISH_REASON: &str = "stop";

#[derive(Debug)]
pub struct EchoProvider {
    name: String,
    models: Vec<String>,
}

impl EchoProvider {
    pub fn new(name: impl Into<String>, models: Vec<String>) -> Self {
        let mut models = models;
        if models.is_empty() {
            models.push(DEFAULT_MODEL.to_string());
        }
        EchoProvider {
            name: name.into(),
            models,
        }
    }

    /// Text to echo: the last user message, falling back to the last
    /// message of any role. Structured content is rendered as compact JSON.
    fn reply_text(messages: &[Message]) -> String {
        let source = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .or_else(|| messages.last());

        match source {
            Some(message) => match &message.content {
                serde_json::Value::String(text) => text.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            },
            None => String::new(),
        }
    }
}

#[async_trait]
impl ChatProvider for EchoProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "echo"
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(self.models.clone())
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderCompletion> {
        Ok(ProviderCompletion {
            content: Self::reply_text(&request.messages),
            finish_reason: FINISH_REASON.to_string(),
            // The echo provider does not count tokens, so usage stays unreported.
            usage: None,
        })
    }

    async fn complete_stream(&self, request: ProviderRequest) -> Result<ProviderEventStream> {
        let text = Self::reply_text(&request.messages);

        let events = stream! {
            let mut first = true;
            for word in text.split_whitespace() {
                let delta = if first {
                    word.to_string()
                } else {
                    format!(" {}", word)
                };
                first = false;
                yield Ok(ProviderEvent::Delta(delta));
            }
            yield Ok(ProviderEvent::Done {
                finish_reason: FINISH_REASON.to_string(),
                usage: None,
            });
        };

        Ok(Box::pin(events))
    }
}
