//! Event router.
//!
//! Dispatches one classified notification: a created object is fetched,
//! decoded and upserted; a removed object is deleted by the id derived from
//! its storage key. Other event kinds are ignored.

use std::sync::Arc;

use tracing::debug;

use sync_index::{DeleteReport, IndexWriter, UpsertReport};
use sync_types::{Document, DocumentId, EventKind, Notification};

use crate::error::WorkerError;
use crate::store::ObjectStore;

/// What routing a notification did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Indexed(UpsertReport),
    Deleted(DeleteReport),
    Ignored(EventKind),
}

/// Routes notifications to the index writer.
pub struct EventRouter {
    store: Arc<dyn ObjectStore>,
    writer: Arc<IndexWriter>,
}

impl EventRouter {
    pub fn new(store: Arc<dyn ObjectStore>, writer: Arc<IndexWriter>) -> Self {
        Self { store, writer }
    }

    /// Apply one notification to both indexes.
    pub async fn route(&self, notification: &Notification) -> Result<RouteOutcome, WorkerError> {
        match &notification.kind {
            EventKind::Created => {
                let bytes = self.store.get(&notification.location).await?;
                let document = Document::from_bytes(&bytes)?;
                let report = self.writer.upsert(&document).await?;
                Ok(RouteOutcome::Indexed(report))
            }
            EventKind::Removed => {
                let id = DocumentId::from_storage_key(&notification.location.key)?;
                let report = self.writer.delete(&id).await?;
                Ok(RouteOutcome::Deleted(report))
            }
            other => {
                debug!(
                    kind = %other,
                    location = %notification.location,
                    "Ignoring event"
                );
                Ok(RouteOutcome::Ignored(other.clone()))
            }
        }
    }
}
