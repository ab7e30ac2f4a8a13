//! Event routing and retry draining for the search-index sync worker.
//!
//! This crate turns object-store notifications into index writes and
//! re-processes failed notifications from the retry queue.
//!
//! ## Key Components
//!
//! - [`ObjectStore`], [`RetryQueue`], [`Invoker`]: Seams to the external
//!   collaborators, with in-memory implementations for tests and local runs
//! - [`EventRouter`]: Dispatches one notification to an upsert or delete
//! - [`TriggerHandler`]: Entry point for one delivered event document
//! - [`DrainLoop`]: Pulls one failed event per hop and chains itself forward
//! - [`FunctionHandler`]: Deployed trigger and drain entry points
//! - [`WorkerError`]: Error types for a single invocation
//!
//! ## Architecture
//!
//! ```text
//! notification -> TriggerHandler -> EventRouter -> IndexWriter (current + legacy)
//!                      |
//!          (runtime dead-letters failures)
//!                      v
//! retry queue -> DrainLoop -> TriggerHandler -> ack -> invoke next hop
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let router = EventRouter::new(store, writer);
//! let handler = Arc::new(TriggerHandler::new(router, RecordMode::First));
//! handler.handle(&event).await?;
//!
//! let drain = DrainLoop::new(queue, handler, invoker, Duration::from_secs(10));
//! let outcome = drain.run_hop(&payload, &identity).await;
//! ```

pub mod drain;
pub mod error;
pub mod function;
pub mod queue;
pub mod router;
pub mod runtime;
pub mod store;
pub mod trigger;

pub use drain::{DrainLimits, DrainLoop, DrainOutcome, DrainReport, DrainStage, DrainStop};
pub use error::{ErrorClass, WorkerError};
pub use function::FunctionHandler;
pub use queue::{MemoryRetryQueue, RetryQueue};
pub use router::{EventRouter, RouteOutcome};
pub use runtime::{FunctionIdentity, Invocation, Invoker, LoopbackInvoker};
pub use store::{MemoryObjectStore, ObjectStore};
pub use trigger::TriggerHandler;
