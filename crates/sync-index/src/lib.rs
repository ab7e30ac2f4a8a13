//! Dual search-index writes for the sync worker.
//!
//! Every document is written to two independent clusters:
//!
//! - the **current** index, through an external version gate, so a stale or
//!   replayed write can never regress a document;
//! - the **legacy** index, unconditionally (last physical write wins).
//!
//! ## Key Components
//!
//! - [`IndexCluster`]: Trait for one cluster's upsert/delete operations
//! - [`ElasticIndex`]: HTTP implementation against an Elasticsearch-style REST API
//! - [`MemoryIndex`]: In-process cluster with the same gate semantics
//! - [`IndexWriter`]: Applies the dual-write policy across both clusters
//! - [`IndexError`]: Error types for index operations
//!
//! ## Example
//!
//! ```ignore
//! use sync_index::{IndexWriter, MemoryIndex, WriterPolicy};
//!
//! let writer = IndexWriter::new(current, legacy, WriterPolicy::default());
//! let report = writer.upsert(&document).await?;
//! ```

pub mod cluster;
pub mod elastic;
pub mod error;
pub mod memory;
pub mod writer;

pub use cluster::{DeleteOutcome, IndexCluster, UpsertRequest, WriteOutcome};
pub use elastic::ElasticIndex;
pub use error::IndexError;
pub use memory::{IndexOp, MemoryIndex, StoredDocument};
pub use writer::{DeleteReport, IndexWriter, UpsertReport, WriterPolicy};
