//! In-process index cluster.
//!
//! Enforces the same external version gate as the HTTP cluster and keeps an
//! operation log, so dual-write behavior can be exercised without a server.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use sync_types::DocumentId;

use crate::cluster::{DeleteOutcome, IndexCluster, UpsertRequest, WriteOutcome};
use crate::error::IndexError;

/// A document as held by [`MemoryIndex`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub routing: String,
    /// External version of the last applied gated write
    pub version: Option<u64>,
    pub body: Value,
}

/// An operation the cluster completed.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexOp {
    Upsert {
        id: String,
        routing: String,
        version: Option<u64>,
        outcome: WriteOutcome,
    },
    Delete {
        id: String,
        routing: String,
        outcome: DeleteOutcome,
    },
}

#[derive(Default)]
struct MemoryState {
    docs: HashMap<String, StoredDocument>,
    ops: Vec<IndexOp>,
    fail_remaining: usize,
}

/// Index cluster backed by a hash map.
pub struct MemoryIndex {
    name: String,
    state: Mutex<MemoryState>,
}

impl MemoryIndex {
    /// Create an empty cluster.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next `count` operations with HTTP 503.
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_remaining = count;
    }

    /// Look up a stored document.
    pub fn get(&self, id: &DocumentId) -> Option<StoredDocument> {
        self.lock().docs.get(&id.to_string()).cloned()
    }

    /// Whether a document exists at `id`.
    pub fn contains(&self, id: &DocumentId) -> bool {
        self.lock().docs.contains_key(&id.to_string())
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.lock().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completed operations, oldest first.
    pub fn ops(&self) -> Vec<IndexOp> {
        self.lock().ops.clone()
    }

    fn take_failure(&self, state: &mut MemoryState) -> Result<(), IndexError> {
        if state.fail_remaining > 0 {
            state.fail_remaining -= 1;
            return Err(IndexError::Remote {
                cluster: self.name.clone(),
                status: 503,
                body: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl IndexCluster for MemoryIndex {
    async fn upsert(&self, request: UpsertRequest<'_>) -> Result<WriteOutcome, IndexError> {
        let mut state = self.lock();
        self.take_failure(&mut state)?;

        let id = request.id.to_string();
        let routing = request.id.routing();

        let rejected = match (request.version, state.docs.get(&id)) {
            (Some(incoming), Some(StoredDocument {
                version: Some(stored),
                ..
            })) => incoming <= *stored,
            _ => false,
        };

        let outcome = if rejected {
            WriteOutcome::VersionConflict
        } else {
            state.docs.insert(
                id.clone(),
                StoredDocument {
                    routing: routing.clone(),
                    version: request.version,
                    body: request.body.clone(),
                },
            );
            WriteOutcome::Applied
        };

        state.ops.push(IndexOp::Upsert {
            id,
            routing,
            version: request.version,
            outcome,
        });
        Ok(outcome)
    }

    async fn delete(&self, id: &DocumentId) -> Result<DeleteOutcome, IndexError> {
        let mut state = self.lock();
        self.take_failure(&mut state)?;

        let key = id.to_string();
        let outcome = match state.docs.remove(&key) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NotFound,
        };

        state.ops.push(IndexOp::Delete {
            id: key,
            routing: id.routing(),
            outcome,
        });
        Ok(outcome)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
