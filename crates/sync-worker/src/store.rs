//! Object store seam.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use sync_types::ObjectLocation;

use crate::error::WorkerError;

/// Read access to the authoritative object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's raw body.
    async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>, WorkerError>;
}

#[derive(Default)]
struct StoreState {
    objects: HashMap<ObjectLocation, Vec<u8>>,
    reads: usize,
    fail_remaining: usize,
}

/// Object store held in memory.
#[derive(Default)]
pub struct MemoryObjectStore {
    state: Mutex<StoreState>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store raw bytes at a location.
    pub fn put(&self, location: ObjectLocation, bytes: impl Into<Vec<u8>>) {
        self.lock().objects.insert(location, bytes.into());
    }

    /// Store a JSON document at a location.
    pub fn put_json(&self, location: ObjectLocation, value: &Value) {
        self.put(location, value.to_string());
    }

    /// Remove an object.
    pub fn remove(&self, location: &ObjectLocation) {
        self.lock().objects.remove(location);
    }

    /// Fail the next `count` reads.
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_remaining = count;
    }

    /// Number of successful reads so far.
    pub fn reads(&self) -> usize {
        self.lock().reads
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>, WorkerError> {
        let mut state = self.lock();
        if state.fail_remaining > 0 {
            state.fail_remaining -= 1;
            return Err(WorkerError::ObjectStore(format!(
                "injected failure reading {location}"
            )));
        }

        let bytes = state
            .objects
            .get(location)
            .cloned()
            .ok_or_else(|| WorkerError::ObjectNotFound(location.clone()))?;
        state.reads += 1;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_and_missing() {
        let store = MemoryObjectStore::new();
        let location = ObjectLocation::new("bucket", "5/ABCD1234");
        store.put(location.clone(), b"{}".to_vec());

        assert_eq!(store.get(&location).await.unwrap(), b"{}".to_vec());
        assert_eq!(store.reads(), 1);

        store.remove(&location);
        assert!(matches!(
            store.get(&location).await,
            Err(WorkerError::ObjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fail_next() {
        let store = MemoryObjectStore::new();
        let location = ObjectLocation::new("bucket", "5/ABCD1234");
        store.put(location.clone(), b"{}".to_vec());
        store.fail_next(1);

        assert!(matches!(
            store.get(&location).await,
            Err(WorkerError::ObjectStore(_))
        ));
        assert!(store.get(&location).await.is_ok());
    }
}
