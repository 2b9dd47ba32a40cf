//! Business logic services for the LLM gateway.
//!
//! This module contains the provider abstraction, the concrete provider
//! implementations, and the registry that routes composite model ids to
//! registered providers.

pub mod echo;
pub mod openai;
pub mod provider;
pub mod registry;

// Re-export commonly used types
pub use echo::EchoProvider;
pub use openai::OpenAiProvider;
pub use provider::{
    ChatProvider, ProviderCompletion, ProviderEvent, ProviderEventStream, ProviderRequest,
};
pub use registry::{build_registry, ProviderRegistry, MODEL_SEPARATOR};
