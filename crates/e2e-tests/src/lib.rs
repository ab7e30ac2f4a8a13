//! End-to-end test infrastructure for search-sync.
//!
//! Provides a shared TestHarness wiring the trigger handler and drain loop
//! to in-memory collaborators, plus helpers to build items and events.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use sync_index::{IndexWriter, MemoryIndex, WriterPolicy};
use sync_types::{DocumentId, ObjectLocation, RecordMode, S3Event};
use sync_worker::{
    DrainLoop, DrainOutcome, EventRouter, FunctionHandler, FunctionIdentity, Invocation,
    Invoker, LoopbackInvoker, MemoryObjectStore, MemoryRetryQueue, RouteOutcome,
    TriggerHandler, WorkerError,
};

/// Bucket every harness object lives in.
pub const BUCKET: &str = "zotero-items";

/// Visibility hold used by the harness drain loop.
pub const VISIBILITY: Duration = Duration::from_secs(10);

/// Shared test harness for E2E tests.
pub struct TestHarness {
    pub store: Arc<MemoryObjectStore>,
    pub current: Arc<MemoryIndex>,
    pub legacy: Arc<MemoryIndex>,
    pub queue: Arc<MemoryRetryQueue>,
    pub invoker: Arc<LoopbackInvoker>,
    pub handler: Arc<TriggerHandler>,
    pub drain: Arc<DrainLoop>,
    /// Deployed trigger function
    pub trigger_function: FunctionHandler,
    /// Deployed drain function
    pub drain_function: FunctionHandler,
}

/// Everything a pumped drain chain did.
#[derive(Debug)]
pub struct ChainRun {
    /// Outcome of each hop, in order
    pub hops: Vec<DrainOutcome>,
    /// Invocations accepted by the runtime, the initial trigger included
    pub invocations: usize,
}

impl ChainRun {
    /// Message ids acknowledged by the chain, in order.
    pub fn acknowledged(&self) -> Vec<String> {
        self.hops
            .iter()
            .filter_map(|hop| match hop {
                DrainOutcome::Rechained { message_id }
                | DrainOutcome::RechainFailed { message_id, .. } => Some(message_id.clone()),
                _ => None,
            })
            .collect()
    }
}

impl TestHarness {
    /// Harness with the default record mode and writer policy.
    pub fn new() -> Self {
        Self::with_options(RecordMode::First, WriterPolicy::default())
    }

    pub fn with_options(mode: RecordMode, policy: WriterPolicy) -> Self {
        let store = Arc::new(MemoryObjectStore::new());
        let current = Arc::new(MemoryIndex::new("current"));
        let legacy = Arc::new(MemoryIndex::new("legacy"));
        let queue = Arc::new(MemoryRetryQueue::new());
        let invoker = Arc::new(LoopbackInvoker::new());

        let writer = Arc::new(IndexWriter::new(current.clone(), legacy.clone(), policy));
        let handler = Arc::new(TriggerHandler::new(
            EventRouter::new(store.clone(), writer),
            mode,
        ));
        let drain = Arc::new(DrainLoop::new(
            queue.clone(),
            handler.clone(),
            invoker.clone(),
            VISIBILITY,
        ));

        Self {
            store,
            current,
            legacy,
            queue,
            invoker,
            trigger_function: FunctionHandler::Trigger(handler.clone()),
            drain_function: FunctionHandler::Drain(drain.clone()),
            handler,
            drain,
        }
    }

    /// Store an item object and return its location.
    pub fn put_item(&self, library: i64, key: &str, version: u64, title: &str) -> ObjectLocation {
        let location = ObjectLocation::new(BUCKET, storage_key(library, key));
        self.store
            .put_json(location.clone(), &item(library, key, version, title));
        location
    }

    /// Deliver a created event for an item.
    pub async fn deliver_created(
        &self,
        library: i64,
        key: &str,
    ) -> Result<Vec<RouteOutcome>, WorkerError> {
        self.handler.handle(&created_event(library, key)).await
    }

    /// Deliver a removed event for an item.
    pub async fn deliver_removed(
        &self,
        library: i64,
        key: &str,
    ) -> Result<Vec<RouteOutcome>, WorkerError> {
        self.handler.handle(&removed_event(library, key)).await
    }

    /// Put an event on the retry queue as the runtime would after giving up.
    pub fn dead_letter(&self, event: &S3Event) -> String {
        self.queue
            .enqueue_event(event)
            .expect("Failed to enqueue event")
    }

    /// Fire the initial drain trigger, then run every hop the chain
    /// requests until it ends or `max_hops` is reached.
    pub async fn pump_chain(
        &self,
        identity: &FunctionIdentity,
        payload: &Value,
        max_hops: usize,
    ) -> ChainRun {
        self.invoker
            .invoke_async(identity, payload)
            .await
            .expect("Failed to issue initial trigger");

        let mut hops = Vec::new();
        while hops.len() < max_hops {
            let Some(invocation) = self.invoker.take_next() else {
                break;
            };
            hops.push(
                self.drain
                    .run_hop(&invocation.payload, &invocation.function)
                    .await,
            );
        }

        ChainRun {
            hops,
            invocations: self.invoker.total(),
        }
    }
}

impl TestHarness {
    /// Like [`TestHarness::pump_chain`], but every hop goes through the
    /// deployed drain function with the identity its invocation context
    /// would report. Returns each hop's response.
    pub async fn pump_function_chain(
        &self,
        identity: &FunctionIdentity,
        payload: &Value,
        max_hops: usize,
    ) -> Vec<Value> {
        self.invoker
            .invoke_async(identity, payload)
            .await
            .expect("Failed to issue initial trigger");

        let mut responses = Vec::new();
        while responses.len() < max_hops {
            let Some(invocation) = self.invoker.take_next() else {
                break;
            };
            let context = context_identity(&invocation);
            responses.push(
                self.drain_function
                    .invoke(invocation.payload, &context)
                    .await
                    .expect("Drain function never fails an invocation"),
            );
        }
        responses
    }
}

/// Identity a function invoked by `invocation` sees in its context.
pub fn context_identity(invocation: &Invocation) -> FunctionIdentity {
    FunctionIdentity::from_context(
        invocation.function.name.clone(),
        invocation.function.qualifier.as_deref().unwrap_or(""),
    )
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn storage_key(library: i64, key: &str) -> String {
    format!("{library}/{key}")
}

/// Item object body.
pub fn item(library: i64, key: &str, version: u64, title: &str) -> Value {
    json!({
        "libraryID": library,
        "key": key,
        "version": version,
        "title": title,
    })
}

pub fn created_event(library: i64, key: &str) -> S3Event {
    S3Event::single("ObjectCreated:Put", BUCKET, storage_key(library, key))
}

pub fn removed_event(library: i64, key: &str) -> S3Event {
    S3Event::single("ObjectRemoved:Delete", BUCKET, storage_key(library, key))
}

pub fn doc_id(library: i64, key: &str) -> DocumentId {
    DocumentId::new(library, key)
}

/// Identity the drain chain re-invokes.
pub fn drain_identity() -> FunctionIdentity {
    FunctionIdentity::new("search-sync-dlq").with_qualifier("12")
}

/// Random item key in the 8-character alphabet items use.
pub fn random_key<R: rand::Rng>(rng: &mut R) -> String {
    const ALPHABET: &[u8] = b"23456789ABCDEFGHIJKLMNPQRSTUVWXYZ";
    (0..8)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}
