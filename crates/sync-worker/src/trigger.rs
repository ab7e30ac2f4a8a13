//! Trigger handler: entry point for one delivered event document.
//!
//! Errors are never caught here. A failed invocation is the runtime's cue
//! to retry and eventually dead-letter the event onto the retry queue.

use tracing::{error, info};

use sync_types::{RecordMode, S3Event, SyncError};

use crate::error::WorkerError;
use crate::router::{EventRouter, RouteOutcome};

pub struct TriggerHandler {
    router: EventRouter,
    mode: RecordMode,
}

impl TriggerHandler {
    pub fn new(router: EventRouter, mode: RecordMode) -> Self {
        Self { router, mode }
    }

    pub fn mode(&self) -> RecordMode {
        self.mode
    }

    /// Decode an event document and handle it.
    pub async fn handle_bytes(&self, payload: &[u8]) -> Result<Vec<RouteOutcome>, WorkerError> {
        let event = S3Event::from_bytes(payload)?;
        self.handle(&event).await
    }

    /// Handle a delivered event document.
    ///
    /// In [`RecordMode::First`] only the first record is routed. In
    /// [`RecordMode::Each`] every record is routed independently and the
    /// failed record indices are reported together after all were tried.
    pub async fn handle(&self, event: &S3Event) -> Result<Vec<RouteOutcome>, WorkerError> {
        match self.mode {
            RecordMode::First => {
                let notification = event.first()?;
                let outcome = self.router.route(&notification).await?;
                Ok(vec![outcome])
            }
            RecordMode::Each => self.handle_each(event).await,
        }
    }

    async fn handle_each(&self, event: &S3Event) -> Result<Vec<RouteOutcome>, WorkerError> {
        let notifications = event.notifications();
        if notifications.is_empty() {
            return Err(SyncError::InvalidNotification("event has no records".to_string()).into());
        }

        let total = notifications.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut failed = Vec::new();

        for (index, notification) in notifications.iter().enumerate() {
            match self.router.route(notification).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(
                        record = index,
                        kind = %notification.kind,
                        location = %notification.location,
                        class = ?e.class(),
                        error = %e,
                        "Record failed"
                    );
                    failed.push(index);
                }
            }
        }

        if !failed.is_empty() {
            return Err(WorkerError::Batch { failed, total });
        }

        info!(records = total, "Handled all records");
        Ok(outcomes)
    }
}
