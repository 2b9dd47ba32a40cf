//! API layer for the gateway server.
//!
//! This module contains all HTTP handlers, request/response models,
//! and streaming support for the API endpoints.

pub mod disconnect;
pub mod handlers;
pub mod models;
pub mod streaming;

// Re-export commonly used types
pub use handlers::{chat_completions, health, list_models, metrics_handler, AppState};
pub use models::{
    ChatCompletionRequest, ChatCompletionResponse, Message, ModelInfo, ModelList, StreamChunk,
    Usage,
};
pub use streaming::create_sse_stream;
