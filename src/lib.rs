//! LLM Gateway - An OpenAI-compatible gateway for local model providers
//!
//! This library provides a local gateway that exposes heterogeneous chat
//! model providers behind one OpenAI-compatible API, with features
//! including:
//!
//! - **Composite Model Routing**: `provider:model` ids route each request
//!   to the registered provider that owns the model
//! - **Streaming Support**: Full support for Server-Sent Events (SSE)
//!   streaming with client-disconnect cancellation
//! - **Unified Model Listing**: One `/models` listing aggregated across
//!   every registered provider
//! - **Metrics & Monitoring**: Prometheus metrics for observability
//! - **Opaque Passthrough**: Message content and unknown request fields
//!   travel to the provider without interpretation
//!
//! # Architecture
//!
//! The codebase is organized into three main layers:
//!
//! - [`core`]: Core functionality (config, errors, ids, metrics, middleware, SSE)
//! - [`api`]: HTTP handlers, wire models, and streaming
//! - [`services`]: Providers and the registry that routes to them
//!
//! # Configuration
//!
//! Providers are registered at startup from a YAML file. Optional
//! environment variables:
//! - `CONFIG_PATH`: Path to the provider config file (default: config.yaml)
//! - `HOST`: Server bind address (default: 0.0.0.0)
//! - `PORT`: Server port (default: 18000)
//! - `RUST_LOG`: Log filter (default: info, debug for this crate)

pub mod api;
pub mod core;
pub mod services;

// Re-export commonly used types for convenience
pub use api::{AppState, ChatCompletionRequest, ChatCompletionResponse, ModelList};
pub use core::{AppConfig, GatewayError, Result};
pub use services::{build_registry, ChatProvider, ProviderRegistry};
