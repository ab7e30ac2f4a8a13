//! Retry envelopes read from the dead-letter queue.
//!
//! Each envelope wraps one failed event document verbatim, plus the
//! receipt handle needed to acknowledge it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::notification::S3Event;

/// A queued, at-least-once delivered failed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryEnvelope {
    /// Queue-assigned message id (for logging)
    pub message_id: String,

    /// Failed event document, JSON-encoded
    pub body: String,

    /// Handle used to delete this delivery
    pub receipt_handle: String,

    /// Until when the message stays hidden from other consumers
    pub visible_until: DateTime<Utc>,
}

impl RetryEnvelope {
    /// Decode the wrapped event document.
    pub fn event(&self) -> Result<S3Event, SyncError> {
        S3Event::from_json(&self.body)
    }
}
