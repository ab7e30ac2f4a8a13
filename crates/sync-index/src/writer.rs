//! Dual-index writer.
//!
//! Applies one document change to the current index and then the legacy
//! index. The two writes are not a transaction: a failure on the current
//! index skips the legacy write, a failure on the legacy index leaves the
//! current write in place. Both are safe to repeat.

use std::sync::Arc;

use tracing::{debug, info, warn};

use sync_types::{Document, DocumentId, WriterSettings};

use crate::cluster::{DeleteOutcome, IndexCluster, UpsertRequest, WriteOutcome};
use crate::error::IndexError;

/// Writer behavior that differs between deployments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterPolicy {
    /// Accept a not-found response on delete instead of failing
    pub tolerate_missing_on_delete: bool,
}

impl WriterPolicy {
    pub fn with_tolerate_missing_on_delete(mut self, tolerate: bool) -> Self {
        self.tolerate_missing_on_delete = tolerate;
        self
    }
}

impl From<&WriterSettings> for WriterPolicy {
    fn from(settings: &WriterSettings) -> Self {
        Self {
            tolerate_missing_on_delete: settings.tolerate_missing_on_delete,
        }
    }
}

/// What an upsert did on each cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertReport {
    pub id: DocumentId,
    pub version: u64,
    pub current: WriteOutcome,
    pub legacy: WriteOutcome,
}

impl UpsertReport {
    /// Whether the current index rejected the write as stale.
    pub fn is_stale(&self) -> bool {
        self.current == WriteOutcome::VersionConflict
    }
}

/// What a delete did on each cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub id: DocumentId,
    pub current: DeleteOutcome,
    pub legacy: DeleteOutcome,
}

/// Writes documents to the current and legacy clusters.
pub struct IndexWriter {
    current: Arc<dyn IndexCluster>,
    legacy: Arc<dyn IndexCluster>,
    policy: WriterPolicy,
}

impl IndexWriter {
    pub fn new(
        current: Arc<dyn IndexCluster>,
        legacy: Arc<dyn IndexCluster>,
        policy: WriterPolicy,
    ) -> Self {
        Self {
            current,
            legacy,
            policy,
        }
    }

    pub fn policy(&self) -> WriterPolicy {
        self.policy
    }

    /// Index a document in both clusters.
    ///
    /// A version conflict on the current index counts as success; it is
    /// the normal result of a duplicate or out-of-order delivery. The legacy
    /// write still happens and may overwrite newer data there.
    pub async fn upsert(&self, document: &Document) -> Result<UpsertReport, IndexError> {
        let id = document.id();
        let body = document.index_body();

        let current = self
            .current
            .upsert(UpsertRequest::gated(&id, document.version, &body))
            .await?;

        if current == WriteOutcome::VersionConflict {
            debug!(
                cluster = %self.current.name(),
                id = %id,
                version = document.version,
                "Ignoring stale write"
            );
        }

        let legacy = self
            .legacy
            .upsert(UpsertRequest::unconditional(&id, &body))
            .await?;

        info!(
            id = %id,
            routing = %id.routing(),
            version = document.version,
            current = ?current,
            "Indexed document"
        );

        Ok(UpsertReport {
            id,
            version: document.version,
            current,
            legacy,
        })
    }

    /// Remove a document from both clusters.
    pub async fn delete(&self, id: &DocumentId) -> Result<DeleteReport, IndexError> {
        let current = self.current.delete(id).await?;
        self.check_delete(self.current.as_ref(), id, current)?;

        let legacy = self.legacy.delete(id).await?;
        self.check_delete(self.legacy.as_ref(), id, legacy)?;

        info!(id = %id, routing = %id.routing(), "Deleted document");

        Ok(DeleteReport {
            id: id.clone(),
            current,
            legacy,
        })
    }

    fn check_delete(
        &self,
        cluster: &dyn IndexCluster,
        id: &DocumentId,
        outcome: DeleteOutcome,
    ) -> Result<(), IndexError> {
        if outcome == DeleteOutcome::NotFound {
            if !self.policy.tolerate_missing_on_delete {
                return Err(IndexError::NotFound {
                    cluster: cluster.name().to_string(),
                    id: id.to_string(),
                });
            }
            warn!(cluster = %cluster.name(), id = %id, "Document already absent");
        }
        Ok(())
    }
}
