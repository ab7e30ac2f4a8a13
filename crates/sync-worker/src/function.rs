//! Deployed function entry points.
//!
//! One binary serves two functions: the notification trigger and the
//! retry-queue drain. The invocation runtime supplies the payload and the
//! identity of the running function; the drain rechains to that identity.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use sync_types::{S3Event, SyncError};

use crate::drain::{DrainLoop, DrainOutcome};
use crate::error::WorkerError;
use crate::router::RouteOutcome;
use crate::runtime::FunctionIdentity;
use crate::trigger::TriggerHandler;

/// Which function a deployment runs.
#[derive(Clone)]
pub enum FunctionHandler {
    /// Handles object-store event documents; errors fail the invocation
    Trigger(Arc<TriggerHandler>),
    /// Runs one drain hop per invocation; never fails the invocation
    Drain(Arc<DrainLoop>),
}

impl FunctionHandler {
    /// Handle one invocation.
    ///
    /// `identity` is the running function as reported by the invocation
    /// context (name and version).
    pub async fn invoke(
        &self,
        payload: Value,
        identity: &FunctionIdentity,
    ) -> Result<Value, WorkerError> {
        match self {
            FunctionHandler::Trigger(handler) => {
                let event: S3Event = serde_json::from_value(payload).map_err(SyncError::from)?;
                let outcomes = handler.handle(&event).await?;
                debug!(records = outcomes.len(), "Trigger invocation complete");
                Ok(trigger_summary(&outcomes))
            }
            FunctionHandler::Drain(drain) => {
                let outcome = drain.run_hop(&payload, identity).await;
                Ok(drain_summary(&outcome))
            }
        }
    }
}

fn trigger_summary(outcomes: &[RouteOutcome]) -> Value {
    let (mut indexed, mut deleted, mut ignored) = (0, 0, 0);
    for outcome in outcomes {
        match outcome {
            RouteOutcome::Indexed(_) => indexed += 1,
            RouteOutcome::Deleted(_) => deleted += 1,
            RouteOutcome::Ignored(_) => ignored += 1,
        }
    }
    json!({"indexed": indexed, "deleted": deleted, "ignored": ignored})
}

fn drain_summary(outcome: &DrainOutcome) -> Value {
    match outcome {
        DrainOutcome::Empty => json!({"outcome": "empty"}),
        DrainOutcome::Stopped {
            message_id,
            stage,
            error,
        } => json!({
            "outcome": "stopped",
            "message_id": message_id,
            "stage": stage.to_string(),
            "error": error.to_string(),
        }),
        DrainOutcome::Rechained { message_id } => {
            json!({"outcome": "rechained", "message_id": message_id})
        }
        DrainOutcome::RechainFailed { message_id, error } => json!({
            "outcome": "rechain_failed",
            "message_id": message_id,
            "error": error.to_string(),
        }),
    }
}
