//! Per-tab session status, kept in the session-scoped store.

use crate::error::StorageError;
use crate::storage::{get_record, set_record, KeyValueStore};
use crate::types::{LockError, LockStatus, SessionState, TabId};

fn tab_key(tab_id: TabId) -> String {
    tab_id.to_string()
}

pub struct SessionManager<S> {
    store: S,
}

impl<S: KeyValueStore> SessionManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Overwrite the state of a tab. `error` is only kept for the error status.
    pub async fn set(
        &self,
        tab_id: TabId,
        status: LockStatus,
        error: Option<LockError>,
    ) -> Result<(), StorageError> {
        let error = error.filter(|_| status == LockStatus::Error);
        let state = SessionState { status, error };
        set_record(&self.store, &tab_key(tab_id), &state).await
    }

    /// Stored state, `inactive` when there is none.
    pub async fn get(&self, tab_id: TabId) -> Result<SessionState, StorageError> {
        Ok(get_record(&self.store, &tab_key(tab_id))
            .await?
            .unwrap_or_default())
    }

    pub async fn delete(&self, tab_id: TabId) -> Result<(), StorageError> {
        self.store.remove(&tab_key(tab_id)).await
    }

    pub async fn has(&self, tab_id: TabId) -> Result<bool, StorageError> {
        Ok(self.store.get(&tab_key(tab_id)).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::ErrorCode;

    #[tokio::test]
    async fn test_absent_tab_is_inactive() {
        let sessions = SessionManager::new(MemoryStore::new());
        assert_eq!(sessions.get(5).await.unwrap(), SessionState::inactive());
        assert!(!sessions.has(5).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        let sessions = SessionManager::new(store.clone());

        sessions
            .set(5, LockStatus::Error, Some(ErrorCode::SystemBlocked.into()))
            .await
            .unwrap();
        assert_eq!(
            store.peek("5"),
            Some(serde_json::json!({"status": "error", "error": "SYSTEM_BLOCKED"}))
        );
        assert_eq!(sessions.get(5).await.unwrap(), SessionState::failed(ErrorCode::SystemBlocked));
        assert!(sessions.has(5).await.unwrap());

        sessions
            .set(5, LockStatus::Active, Some(ErrorCode::Unknown.into()))
            .await
            .unwrap();
        assert_eq!(sessions.get(5).await.unwrap(), SessionState::new(LockStatus::Active));

        sessions.delete(5).await.unwrap();
        sessions.delete(5).await.unwrap();
        assert!(!sessions.has(5).await.unwrap());
    }

    #[tokio::test]
    async fn test_tabs_are_independent() {
        let sessions = SessionManager::new(MemoryStore::new());
        sessions.set(1, LockStatus::Active, None).await.unwrap();
        sessions.set(2, LockStatus::Pending, None).await.unwrap();

        sessions.delete(1).await.unwrap();

        assert_eq!(sessions.get(1).await.unwrap().status, LockStatus::Inactive);
        assert_eq!(sessions.get(2).await.unwrap().status, LockStatus::Pending);
    }
}
