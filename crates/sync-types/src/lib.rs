//! # sync-types
//!
//! Shared domain types for the search-index sync worker.
//!
//! This crate defines the data that flows through the pipeline:
//! - Documents: stored objects decoded for indexing
//! - Notifications: object-store change events (created / removed)
//! - Retry envelopes: failed events waiting on the retry queue
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use sync_types::{Document, DocumentId};
//!
//! let doc = Document::from_bytes(br#"{"libraryID":5,"key":"ABCD1234","version":3}"#).unwrap();
//! assert_eq!(doc.id(), DocumentId::new(5, "ABCD1234"));
//! ```

pub mod config;
pub mod document;
pub mod envelope;
pub mod error;
pub mod notification;

pub use config::{
    DrainSettings, FunctionSettings, IndexTargetSettings, ObjectStoreSettings, QueueSettings,
    RecordMode, Settings, TriggerSettings, WriterSettings,
};
pub use document::{Document, DocumentId};
pub use envelope::RetryEnvelope;
pub use error::SyncError;
pub use notification::{EventKind, Notification, ObjectLocation, S3Event};
