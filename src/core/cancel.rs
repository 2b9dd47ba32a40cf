//! Cancellation plumbing for streaming completions.
//!
//! A `StreamCancelHandle` links the outgoing response body to the upstream
//! provider stream: when the client drops the body before the stream has
//! completed, the handle fires and the provider side stops consuming.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Handle for cancelling a streaming completion when the client disconnects.
#[derive(Clone)]
pub struct StreamCancelHandle {
    sender: watch::Sender<bool>,
    receiver: watch::Receiver<bool>,
    /// Set when the stream ended normally (DONE sentinel written)
    completed: Arc<AtomicBool>,
}

impl StreamCancelHandle {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender,
            receiver,
            completed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark the stream as completed normally.
    ///
    /// A drop of the response body after this point is not a disconnect.
    pub fn mark_completed(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    /// Check if the stream completed normally.
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Signal cancellation (only if not already completed).
    pub fn cancel(&self) {
        if !self.is_completed() {
            let _ = self.sender.send(true);
        }
    }

    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait until cancellation fires.
    ///
    /// Resolves immediately when already cancelled; pends forever when the
    /// stream completes without cancellation. Intended for `tokio::select!`
    /// against the upstream provider stream.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow() {
                return;
            }
            if receiver.changed().await.is_err() {
                // Sender gone without firing; never cancelled.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Get a receiver for use in select!
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.receiver.clone()
    }
}

impl Default for StreamCancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_handle_is_neither_cancelled_nor_completed() {
        let handle = StreamCancelHandle::new();
        assert!(!handle.is_cancelled());
        assert!(!handle.is_completed());
    }

    #[test]
    fn test_cancel_sets_flag() {
        let handle = StreamCancelHandle::new();
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_cancel_after_completion_is_ignored() {
        let handle = StreamCancelHandle::new();
        handle.mark_completed();
        handle.cancel();
        assert!(!handle.is_cancelled());
        assert!(handle.is_completed());
    }

    #[test]
    fn test_clones_share_state() {
        let handle = StreamCancelHandle::new();
        let clone = handle.clone();
        handle.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_cancel() {
        let handle = StreamCancelHandle::new();
        let waiter = handle.clone();

        let task = tokio::spawn(async move {
            waiter.cancelled().await;
            true
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();

        let fired = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(fired);
    }

    #[tokio::test]
    async fn test_cancelled_pends_without_cancel() {
        let handle = StreamCancelHandle::new();
        let result =
            tokio::time::timeout(Duration::from_millis(50), handle.cancelled()).await;
        assert!(result.is_err());
    }
}
