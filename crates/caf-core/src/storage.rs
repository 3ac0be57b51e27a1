//! Key-value storage capability
//!
//! The extension keeps two stores: a durable one for rules and a
//! session-scoped one for per-tab status. Both are injected as
//! [`KeyValueStore`] implementations.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StorageError;

/// Asynchronous JSON key-value store.
#[async_trait(?Send)]
pub trait KeyValueStore {
    /// Value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Overwrite `key`.
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a typed record.
pub async fn get_record<T, S>(store: &S, key: &str) -> Result<Option<T>, StorageError>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    match store.get(key).await? {
        Some(Value::Null) | None => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                key: key.to_string(),
                source,
            }),
    }
}

/// Encode and write a typed record.
pub async fn set_record<T, S>(store: &S, key: &str, record: &T) -> Result<(), StorageError>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let value = serde_json::to_value(record).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.set(key, value).await
}

// =============================================================================
// In-memory store
// =============================================================================

/// In-memory store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    /// Raw value, bypassing the async interface.
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }

    /// Sorted keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait(?Send)]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.entries.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LockStatus, SessionState};

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        let shared = store.clone();

        set_record(&store, "7", &SessionState::new(LockStatus::Active)).await.unwrap();
        assert!(shared.contains_key("7"));

        let state: Option<SessionState> = get_record(&shared, "7").await.unwrap();
        assert_eq!(state, Some(SessionState::new(LockStatus::Active)));

        store.remove("7").await.unwrap();
        store.remove("7").await.unwrap();
        assert!(shared.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_record() {
        let store = MemoryStore::new();
        store.set("7", serde_json::json!({"status": 42})).await.unwrap();

        let result: Result<Option<SessionState>, _> = get_record(&store, "7").await;
        assert!(matches!(result, Err(StorageError::Corrupt { ref key, .. }) if key == "7"));
    }
}
