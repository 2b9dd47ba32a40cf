//! OpenAI-compatible wire types.
//!
//! Request and response bodies for `/chat/completions` and `/models`.
//! Message content is carried as raw JSON and forwarded untouched, so
//! string and structured (multi-part) content both pass through. Fields
//! the gateway does not interpret land in the flattened `extra` map and
//! travel to the provider as-is.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Chat completion request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Composite model id, `provider:model`.
    pub model: String,
    pub messages: Vec<Message>,
    /// Stream the response as SSE chunks instead of a single JSON body.
    #[serde(default)]
    pub stream: bool,
    /// Everything else (temperature, max_tokens, ...) passes through
    /// to the provider without interpretation.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    /// Opaque content: plain string or structured parts, never normalized.
    #[serde(default)]
    pub content: Value,
}

/// Chat completion response body (non-streaming).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    /// Echo of the composite model id from the request.
    pub model: String,
    pub choices: Vec<Choice>,
    /// Only present when the provider reported usage; never computed here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatCompletionResponse {
    /// Build a single-choice assistant response.
    pub fn new(
        id: String,
        created: i64,
        model: String,
        content: String,
        finish_reason: String,
        usage: Option<Usage>,
    ) -> Self {
        Self {
            id,
            object: "chat.completion".to_string(),
            created,
            model,
            choices: vec![Choice {
                index: 0,
                message: Message {
                    role: "assistant".to_string(),
                    content: Value::String(content),
                },
                finish_reason: Some(finish_reason),
            }],
            usage,
        }
    }
}

/// One completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: Message,
    pub finish_reason: Option<String>,
}

/// Token usage as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One SSE chunk of a streaming completion.
///
/// Every chunk of a stream shares the same `id`, `created` and `model`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<StreamChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    /// A content increment. The first chunk of a stream announces the
    /// assistant role; later chunks carry content only.
    pub fn delta(id: &str, created: i64, model: &str, first: bool, content: String) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.to_string(),
            choices: vec![StreamChoice {
                index: 0,
                delta: Delta {
                    role: first.then(|| "assistant".to_string()),
                    content: Some(content),
                },
                finish_reason: None,
            }],
            usage: None,
        }
    }

    /// The terminal chunk: empty delta, finish reason set.
    pub fn terminal(
        id: &str,
        created: i64,
        model: &str,
        finish_reason: String,
        usage: Option<Usage>,
    ) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.to_string(),
            choices: vec![StreamChoice {
                index: 0,
                delta: Delta {
                    role: None,
                    content: None,
                },
                finish_reason: Some(finish_reason),
            }],
            usage,
        }
    }
}

/// One choice inside a stream chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

/// Incremental message content.
///
/// Both fields are skipped when absent so the terminal chunk serializes
/// its delta as `{}`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One entry in the model listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Composite id, `provider:model`.
    pub id: String,
    pub object: String,
    pub created: i64,
    /// Name of the provider that owns the model.
    pub owned_by: String,
}

/// Response body for `GET /models`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelInfo>,
}
