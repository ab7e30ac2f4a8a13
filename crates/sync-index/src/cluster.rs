//! Index cluster trait.
//!
//! Defines the storage boundary for one search-index cluster. The version
//! gate is a compare-and-set performed by the cluster itself; callers only
//! observe whether the write was applied.

use async_trait::async_trait;
use serde_json::Value;

use sync_types::DocumentId;

use crate::error::IndexError;

/// Result of an upsert the cluster accepted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Document stored
    Applied,
    /// Version gate rejected the write (stored version >= incoming)
    VersionConflict,
}

/// Result of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// No document at that id
    NotFound,
}

/// One document write.
///
/// Routing is always derived from the id so both clusters partition a
/// library's documents identically.
#[derive(Debug, Clone, Copy)]
pub struct UpsertRequest<'a> {
    pub id: &'a DocumentId,

    /// External version; when set the write only applies if it is strictly
    /// greater than the stored version
    pub version: Option<u64>,

    pub body: &'a Value,
}

impl<'a> UpsertRequest<'a> {
    /// Write accepted only if `version` is newer than what is stored.
    pub fn gated(id: &'a DocumentId, version: u64, body: &'a Value) -> Self {
        Self {
            id,
            version: Some(version),
            body,
        }
    }

    /// Last-write-wins write.
    pub fn unconditional(id: &'a DocumentId, body: &'a Value) -> Self {
        Self {
            id,
            version: None,
            body,
        }
    }
}

/// Trait for a single search-index cluster.
#[async_trait]
pub trait IndexCluster: Send + Sync {
    /// Create or replace a document.
    async fn upsert(&self, request: UpsertRequest<'_>) -> Result<WriteOutcome, IndexError>;

    /// Delete a document, routed by its library id.
    async fn delete(&self, id: &DocumentId) -> Result<DeleteOutcome, IndexError>;

    /// Name of this cluster for logging.
    fn name(&self) -> &str;
}
