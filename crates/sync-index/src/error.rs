//! Error types for index operations.

use thiserror::Error;

/// Errors that can occur writing to an index cluster.
///
/// A rejected version-gated write is not an error; see
/// [`WriteOutcome::VersionConflict`](crate::WriteOutcome::VersionConflict).
#[derive(Error, Debug)]
pub enum IndexError {
    /// Request never produced a response (connect, timeout, TLS...)
    #[error("Transport error on {cluster}: {source}")]
    Transport {
        cluster: String,
        #[source]
        source: reqwest::Error,
    },

    /// Cluster answered with a non-success status
    #[error("{cluster} returned HTTP {status}: {body}")]
    Remote {
        cluster: String,
        status: u16,
        body: String,
    },

    /// Delete addressed a document the cluster does not have
    #[error("Document {id} not found in {cluster}")]
    NotFound { cluster: String, id: String },

    /// Invalid cluster configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON encoding/decoding errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}
