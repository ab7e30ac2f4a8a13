//! Dead-letter drain loop.
//!
//! Each hop moves exactly one envelope: fetch -> process -> acknowledge ->
//! re-invoke. A hop that fails anywhere stops the chain without deleting the
//! envelope; it becomes receivable again once its visibility hold expires and
//! is picked up by the next externally triggered drain. An empty queue also
//! ends the chain.
//!
//! [`DrainLoop::drain_bounded`] runs the same hops in a local loop for
//! environments without an invocation runtime, capped by hop count and
//! wall-clock time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use sync_types::{DrainSettings, RetryEnvelope};

use crate::error::WorkerError;
use crate::queue::RetryQueue;
use crate::router::RouteOutcome;
use crate::runtime::{FunctionIdentity, Invoker};
use crate::trigger::TriggerHandler;

/// Where in a hop a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStage {
    Fetching,
    Processing,
    Acknowledging,
}

impl fmt::Display for DrainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrainStage::Fetching => write!(f, "fetching"),
            DrainStage::Processing => write!(f, "processing"),
            DrainStage::Acknowledging => write!(f, "acknowledging"),
        }
    }
}

/// Result of one chained hop.
#[derive(Debug)]
pub enum DrainOutcome {
    /// Nothing to do; chain ends
    Empty,
    /// Hop failed; envelope left on the queue, chain ends
    Stopped {
        message_id: Option<String>,
        stage: DrainStage,
        error: WorkerError,
    },
    /// Envelope acknowledged and the next hop requested
    Rechained { message_id: String },
    /// Envelope acknowledged but the next hop could not be requested
    RechainFailed {
        message_id: String,
        error: WorkerError,
    },
}

impl DrainOutcome {
    /// Whether this hop acknowledged an envelope.
    pub fn acknowledged(&self) -> bool {
        matches!(
            self,
            DrainOutcome::Rechained { .. } | DrainOutcome::RechainFailed { .. }
        )
    }
}

/// Caps for [`DrainLoop::drain_bounded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainLimits {
    pub max_hops: usize,
    pub max_duration: Duration,
}

impl From<&DrainSettings> for DrainLimits {
    fn from(settings: &DrainSettings) -> Self {
        Self {
            max_hops: settings.max_hops,
            max_duration: Duration::from_secs(settings.max_duration_secs),
        }
    }
}

/// Why a bounded drain ended.
#[derive(Debug)]
pub enum DrainStop {
    Empty,
    Failed {
        message_id: Option<String>,
        stage: DrainStage,
        error: WorkerError,
    },
    HopLimit,
    TimeLimit,
}

/// Summary of a bounded drain.
#[derive(Debug)]
pub struct DrainReport {
    /// Envelopes received and processed (successfully or not)
    pub hops: usize,
    /// Message ids acknowledged, in order
    pub acknowledged: Vec<String>,
    pub stop: DrainStop,
}

enum Step {
    Empty,
    Acknowledged {
        message_id: String,
    },
    Failed {
        message_id: Option<String>,
        stage: DrainStage,
        error: WorkerError,
    },
}

/// Drains the retry queue one envelope per hop.
pub struct DrainLoop {
    queue: Arc<dyn RetryQueue>,
    handler: Arc<TriggerHandler>,
    invoker: Arc<dyn Invoker>,
    visibility: Duration,
}

impl DrainLoop {
    pub fn new(
        queue: Arc<dyn RetryQueue>,
        handler: Arc<TriggerHandler>,
        invoker: Arc<dyn Invoker>,
        visibility: Duration,
    ) -> Self {
        Self {
            queue,
            handler,
            invoker,
            visibility,
        }
    }

    /// Run one hop of the chain.
    ///
    /// Only after an envelope was processed and acknowledged is a fresh
    /// invocation of `identity` requested with the same `payload`. Failures
    /// are logged and reported in the outcome, never returned as errors.
    pub async fn run_hop(&self, payload: &Value, identity: &FunctionIdentity) -> DrainOutcome {
        match self.step().await {
            Step::Empty => DrainOutcome::Empty,
            Step::Failed {
                message_id,
                stage,
                error,
            } => DrainOutcome::Stopped {
                message_id,
                stage,
                error,
            },
            Step::Acknowledged { message_id } => {
                match self.invoker.invoke_async(identity, payload).await {
                    Ok(()) => {
                        info!(
                            message_id = %message_id,
                            function = %identity.name,
                            qualifier = identity.qualifier.as_deref().unwrap_or("-"),
                            "Requested next drain hop"
                        );
                        DrainOutcome::Rechained { message_id }
                    }
                    Err(error) => {
                        warn!(
                            message_id = %message_id,
                            function = %identity.name,
                            error = %error,
                            "Could not request next drain hop; chain resumes on next trigger"
                        );
                        DrainOutcome::RechainFailed { message_id, error }
                    }
                }
            }
        }
    }

    /// Drain in a local loop until the queue is empty, a hop fails, or a
    /// cap is reached.
    pub async fn drain_bounded(&self, limits: DrainLimits) -> DrainReport {
        let started = Instant::now();
        let mut hops = 0;
        let mut acknowledged = Vec::new();

        let stop = loop {
            if hops >= limits.max_hops {
                info!(hops, "Reached max hops");
                break DrainStop::HopLimit;
            }
            if started.elapsed() >= limits.max_duration {
                info!(hops, elapsed_ms = started.elapsed().as_millis() as u64, "Reached max duration");
                break DrainStop::TimeLimit;
            }

            match self.step().await {
                Step::Empty => break DrainStop::Empty,
                Step::Failed {
                    message_id,
                    stage,
                    error,
                } => {
                    if message_id.is_some() {
                        hops += 1;
                    }
                    break DrainStop::Failed {
                        message_id,
                        stage,
                        error,
                    };
                }
                Step::Acknowledged { message_id } => {
                    hops += 1;
                    acknowledged.push(message_id);
                }
            }
        };

        info!(
            hops,
            acknowledged = acknowledged.len(),
            "Drain finished"
        );

        DrainReport {
            hops,
            acknowledged,
            stop,
        }
    }

    /// Fetch, process and acknowledge at most one envelope.
    async fn step(&self) -> Step {
        let envelope = match self.queue.receive_one(self.visibility).await {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                debug!("Retry queue empty");
                return Step::Empty;
            }
            Err(error) => return Self::failed(None, DrainStage::Fetching, error),
        };

        let message_id = envelope.message_id.clone();

        if let Err(error) = self.process(&envelope).await {
            return Self::failed(Some(message_id), DrainStage::Processing, error);
        }

        if let Err(error) = self.queue.delete(&envelope.receipt_handle).await {
            return Self::failed(Some(message_id), DrainStage::Acknowledging, error);
        }

        debug!(message_id = %message_id, "Acknowledged retry envelope");
        Step::Acknowledged { message_id }
    }

    async fn process(&self, envelope: &RetryEnvelope) -> Result<Vec<RouteOutcome>, WorkerError> {
        let event = envelope.event()?;
        self.handler.handle(&event).await
    }

    fn failed(message_id: Option<String>, stage: DrainStage, error: WorkerError) -> Step {
        error!(
            message_id = message_id.as_deref().unwrap_or("-"),
            stage = %stage,
            class = ?error.class(),
            error = %error,
            "Drain hop failed; stopping chain"
        );
        Step::Failed {
            message_id,
            stage,
            error,
        }
    }
}
