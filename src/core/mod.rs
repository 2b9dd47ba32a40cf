//! Core functionality for the LLM gateway.
//!
//! This module contains fundamental components used throughout the application:
//! - Configuration management
//! - Error handling
//! - Completion id generation
//! - Metrics collection
//! - HTTP middleware
//! - SSE framing
//! - Stream cancellation

pub mod cancel;
pub mod config;
pub mod error;
pub mod ids;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod sse;

// Re-export commonly used types
pub use cancel::StreamCancelHandle;
pub use config::{AppConfig, ProviderConfig, ServerConfig};
pub use error::{GatewayError, Result};
pub use ids::{IdGenerator, SequentialIds, UuidIds};
pub use logging::{get_request_id, REQUEST_ID};
pub use metrics::{get_metrics, init_metrics, Metrics};
pub use middleware::MetricsMiddleware;
