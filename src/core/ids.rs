//! Completion id generation.
//!
//! The id source is injected into the application state as a trait object
//! so tests can pin ids to a deterministic sequence while production draws
//! random-unique ones. One id is drawn per completion and shared by the
//! response, or by every chunk of the stream that subdivides it.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of `chatcmpl-*` completion ids.
pub trait IdGenerator: Send + Sync {
    /// Produce the next completion id, including the `chatcmpl-` prefix.
    fn next_id(&self) -> String;
}

/// Production generator backed by UUIDv4.
#[derive(Debug, Default)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> String {
        format!("chatcmpl-{}", Uuid::new_v4().simple())
    }
}

/// Deterministic generator for tests: `chatcmpl-1`, `chatcmpl-2`, ...
#[derive(Debug, Default)]
pub struct SequentialIds {
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("chatcmpl-{}", n)
    }
}
