//! Object-store change notifications.
//!
//! The invocation runtime delivers the object store's event document
//! (`{"Records": [...]}`). Only the event name and the addressed object are
//! used; every other field of a record is ignored.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Kind of change a notification reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Object created or overwritten (`ObjectCreated:*`)
    Created,
    /// Object deleted (`ObjectRemoved:*`)
    Removed,
    /// Any other event name; routed as a no-op
    Other(String),
}

impl EventKind {
    /// Classify an event name by prefix.
    pub fn classify(event_name: &str) -> Self {
        if event_name.starts_with("ObjectCreated") {
            EventKind::Created
        } else if event_name.starts_with("ObjectRemoved") {
            EventKind::Removed
        } else {
            EventKind::Other(event_name.to_string())
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Created => write!(f, "created"),
            EventKind::Removed => write!(f, "removed"),
            EventKind::Other(name) => write!(f, "other({name})"),
        }
    }
}

/// Address of an object in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    /// Bucket / container name
    pub container: String,
    /// Storage key, `<libraryID>/<key>`
    pub key: String,
}

impl ObjectLocation {
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}

/// One classified change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: EventKind,
    pub location: ObjectLocation,
}

/// Event document as delivered by the object store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

/// A single record of an event document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "eventName")]
    pub event_name: String,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRef {
    pub key: String,
}

impl EventRecord {
    /// Classify this record.
    pub fn notification(&self) -> Notification {
        Notification {
            kind: EventKind::classify(&self.event_name),
            location: ObjectLocation::new(&self.s3.bucket.name, &self.s3.object.key),
        }
    }
}

impl S3Event {
    /// Build a single-record event.
    pub fn single(
        event_name: impl Into<String>,
        container: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            records: vec![EventRecord {
                event_name: event_name.into(),
                s3: S3Entity {
                    bucket: BucketRef {
                        name: container.into(),
                    },
                    object: ObjectRef { key: key.into() },
                },
            }],
        }
    }

    /// Decode from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Decode from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, SyncError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The notification addressed by the first record.
    ///
    /// Later records are not examined.
    pub fn first(&self) -> Result<Notification, SyncError> {
        self.records
            .first()
            .map(EventRecord::notification)
            .ok_or_else(|| SyncError::InvalidNotification("event has no records".to_string()))
    }

    /// Every record, classified.
    pub fn notifications(&self) -> Vec<Notification> {
        self.records.iter().map(EventRecord::notification).collect()
    }
}
