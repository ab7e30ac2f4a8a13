//! Retry queue seam.
//!
//! The queue holds events the invocation runtime gave up on. A received
//! envelope is hidden for a visibility hold; if it is not deleted before
//! the hold expires it becomes receivable again.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use sync_types::{RetryEnvelope, S3Event};

use crate::error::WorkerError;

/// Access to the dead-letter retry queue.
#[async_trait]
pub trait RetryQueue: Send + Sync {
    /// Receive at most one envelope, hiding it for `visibility`.
    async fn receive_one(&self, visibility: Duration)
        -> Result<Option<RetryEnvelope>, WorkerError>;

    /// Delete a received envelope by its receipt handle.
    async fn delete(&self, receipt_handle: &str) -> Result<(), WorkerError>;
}

struct QueuedMessage {
    message_id: String,
    body: String,
    receipt_handle: Option<String>,
    visible_at: DateTime<Utc>,
    receive_count: u32,
}

#[derive(Default)]
struct QueueState {
    messages: Vec<QueuedMessage>,
    deleted: Vec<String>,
    fail_remaining: usize,
}

/// In-memory queue with visibility holds and receipt handles.
#[derive(Default)]
pub struct MemoryRetryQueue {
    state: Mutex<QueueState>,
}

impl MemoryRetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a raw message body, returning its message id.
    pub fn enqueue(&self, body: impl Into<String>) -> String {
        let message_id = ulid::Ulid::new().to_string();
        self.lock().messages.push(QueuedMessage {
            message_id: message_id.clone(),
            body: body.into(),
            receipt_handle: None,
            visible_at: Utc::now(),
            receive_count: 0,
        });
        message_id
    }

    /// Enqueue a failed event document.
    pub fn enqueue_event(&self, event: &S3Event) -> Result<String, WorkerError> {
        Ok(self.enqueue(event.to_json()?))
    }

    /// Messages still on the queue, visible or not.
    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Message ids deleted so far, in deletion order.
    pub fn deleted(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    /// How often a message has been received.
    pub fn receive_count(&self, message_id: &str) -> Option<u32> {
        self.lock()
            .messages
            .iter()
            .find(|m| m.message_id == message_id)
            .map(|m| m.receive_count)
    }

    /// End every visibility hold now.
    pub fn expire_visibility(&self) {
        let now = Utc::now();
        for message in &mut self.lock().messages {
            message.visible_at = now;
        }
    }

    /// Fail the next `count` queue requests.
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_remaining = count;
    }

    fn take_failure(state: &mut QueueState) -> Result<(), WorkerError> {
        if state.fail_remaining > 0 {
            state.fail_remaining -= 1;
            return Err(WorkerError::Queue("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RetryQueue for MemoryRetryQueue {
    async fn receive_one(
        &self,
        visibility: Duration,
    ) -> Result<Option<RetryEnvelope>, WorkerError> {
        let mut state = self.lock();
        Self::take_failure(&mut state)?;

        let now = Utc::now();
        let hold = chrono::Duration::from_std(visibility)
            .map_err(|e| WorkerError::Queue(format!("invalid visibility hold: {e}")))?;

        let Some(message) = state.messages.iter_mut().find(|m| m.visible_at <= now) else {
            return Ok(None);
        };

        let receipt_handle = ulid::Ulid::new().to_string();
        message.receipt_handle = Some(receipt_handle.clone());
        message.visible_at = now + hold;
        message.receive_count += 1;

        debug!(
            message_id = %message.message_id,
            receive_count = message.receive_count,
            "Received retry envelope"
        );

        Ok(Some(RetryEnvelope {
            message_id: message.message_id.clone(),
            body: message.body.clone(),
            receipt_handle,
            visible_until: message.visible_at,
        }))
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), WorkerError> {
        let mut state = self.lock();
        Self::take_failure(&mut state)?;

        let position = state
            .messages
            .iter()
            .position(|m| m.receipt_handle.as_deref() == Some(receipt_handle))
            .ok_or_else(|| {
                WorkerError::Queue(format!("receipt handle {receipt_handle} is not valid"))
            })?;

        let message = state.messages.remove(position);
        state.deleted.push(message.message_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOLD: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_receive_hides_message() {
        let queue = MemoryRetryQueue::new();
        let id = queue.enqueue("{}");

        let envelope = queue.receive_one(HOLD).await.unwrap().unwrap();
        assert_eq!(envelope.message_id, id);
        assert!(envelope.visible_until > Utc::now());

        // Hidden while the hold lasts
        assert!(queue.receive_one(HOLD).await.unwrap().is_none());
        assert_eq!(queue.len(), 1);

        queue.expire_visibility();
        let again = queue.receive_one(HOLD).await.unwrap().unwrap();
        assert_eq!(again.message_id, id);
        assert_ne!(again.receipt_handle, envelope.receipt_handle);
        assert_eq!(queue.receive_count(&id), Some(2));
    }

    #[tokio::test]
    async fn test_delete_by_receipt() {
        let queue = MemoryRetryQueue::new();
        let id = queue.enqueue("{}");

        let envelope = queue.receive_one(HOLD).await.unwrap().unwrap();
        queue.delete(&envelope.receipt_handle).await.unwrap();

        assert!(queue.is_empty());
        assert_eq!(queue.deleted(), vec![id]);
    }

    #[tokio::test]
    async fn test_delete_unknown_receipt() {
        let queue = MemoryRetryQueue::new();
        queue.enqueue("{}");
        assert!(matches!(
            queue.delete("bogus").await,
            Err(WorkerError::Queue(_))
        ));
    }

    #[tokio::test]
    async fn test_receive_empty() {
        let queue = MemoryRetryQueue::new();
        assert!(queue.receive_one(HOLD).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = MemoryRetryQueue::new();
        let first = queue.enqueue("1");
        let second = queue.enqueue("2");

        let a = queue.receive_one(HOLD).await.unwrap().unwrap();
        let b = queue.receive_one(HOLD).await.unwrap().unwrap();
        assert_eq!(a.message_id, first);
        assert_eq!(b.message_id, second);
    }
}
