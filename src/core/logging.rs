//! Request-scoped logging context.
//!
//! Task-local values let every log line emitted while handling a request
//! carry the request id and the provider it resolved to, without passing
//! them through every function call. Each HTTP request runs in its own
//! scope; concurrent requests never observe each other's context.

tokio::task_local! {
    /// Task-local storage for the current provider name.
    ///
    /// Set once the model resolver has picked a provider, so downstream
    /// logs can name it.
    pub static PROVIDER_CONTEXT: String;
}

tokio::task_local! {
    /// Task-local storage for the current request ID.
    ///
    /// Ties together all logs emitted while handling a single request.
    pub static REQUEST_ID: String;
}

/// Get the current provider name from context, if set.
///
/// Returns an empty string if no provider context is set.
pub fn get_provider_context() -> String {
    PROVIDER_CONTEXT
        .try_with(|ctx| ctx.clone())
        .unwrap_or_default()
}

/// Get the current request ID from context, if set.
///
/// Returns an empty string if no request ID is set.
pub fn get_request_id() -> String {
    REQUEST_ID.try_with(|id| id.clone()).unwrap_or_default()
}

/// Generate a new unique request ID using UUID v4.
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Execute an async block with request context (request_id, provider).
///
/// This macro simplifies the nested scope pattern used in handlers.
///
/// # Example
///
/// ```ignore
/// with_request_context!(request_id, provider_name, async {
///     // handler logic here
/// })
/// ```
#[macro_export]
macro_rules! with_request_context {
    ($request_id:expr, $provider_name:expr, $body:expr) => {
        $crate::core::logging::REQUEST_ID
            .scope($request_id, async {
                $crate::core::logging::PROVIDER_CONTEXT
                    .scope($provider_name, $body)
                    .await
            })
            .await
    };
    // Version without provider context
    ($request_id:expr, $body:expr) => {
        $crate::core::logging::REQUEST_ID.scope($request_id, $body).await
    };
}
