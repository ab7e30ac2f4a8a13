//! Error types for a single worker invocation.

use sync_index::IndexError;
use sync_types::{ObjectLocation, SyncError};
use thiserror::Error;

/// Errors that fail the current invocation.
///
/// None of these are retried inside the worker; the invocation runtime or
/// the retry queue's redelivery takes care of that.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Malformed event, envelope, object body or storage key
    #[error(transparent)]
    Types(#[from] SyncError),

    /// Index cluster failure
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Object addressed by a created event no longer exists
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectLocation),

    /// Object store request failed
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Retry queue request failed
    #[error("Retry queue error: {0}")]
    Queue(String),

    /// Re-invocation request failed
    #[error("Invocation error: {0}")]
    Invocation(String),

    /// Some records of a multi-record event failed
    #[error("{} of {} records failed", .failed.len(), .total)]
    Batch { failed: Vec<usize>, total: usize },
}

/// Coarse failure class, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Input can never succeed as-is
    Decode,
    /// Remote or transient failure; a later attempt may succeed
    Remote,
    /// Local misconfiguration
    Config,
}

impl WorkerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            WorkerError::Types(SyncError::Config(_)) => ErrorClass::Config,
            WorkerError::Types(_) => ErrorClass::Decode,
            WorkerError::Index(IndexError::Config(_)) => ErrorClass::Config,
            WorkerError::Index(IndexError::Serialization(_)) => ErrorClass::Decode,
            WorkerError::Index(_)
            | WorkerError::ObjectNotFound(_)
            | WorkerError::ObjectStore(_)
            | WorkerError::Queue(_)
            | WorkerError::Invocation(_)
            | WorkerError::Batch { .. } => ErrorClass::Remote,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WorkerError::ObjectNotFound(ObjectLocation::new("bucket", "5/ABCD1234"));
        assert_eq!(err.to_string(), "Object not found: bucket/5/ABCD1234");

        let err = WorkerError::Batch {
            failed: vec![0, 2],
            total: 3,
        };
        assert_eq!(err.to_string(), "2 of 3 records failed");

        let err: WorkerError = SyncError::InvalidKey("ABCD".to_string()).into();
        assert_eq!(err.to_string(), "Invalid storage key: ABCD");
    }

    #[test]
    fn test_error_class() {
        let err: WorkerError = SyncError::InvalidNotification("empty".to_string()).into();
        assert_eq!(err.class(), ErrorClass::Decode);

        let err: WorkerError = IndexError::Remote {
            cluster: "current".to_string(),
            status: 500,
            body: String::new(),
        }
        .into();
        assert_eq!(err.class(), ErrorClass::Remote);

        assert_eq!(
            WorkerError::Queue("throttled".to_string()).class(),
            ErrorClass::Remote
        );
    }
}
