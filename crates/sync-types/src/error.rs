//! Error types for decoding and configuration.

use thiserror::Error;

/// Errors raised while decoding inputs or loading settings.
///
/// Decode failures are fatal for the current invocation and are never
/// retried locally.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed JSON in an object body, event or envelope
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Storage key that does not split into `<libraryID>/<key>`
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// Event document without a usable record
    #[error("Invalid notification: {0}")]
    InvalidNotification(String),
}
