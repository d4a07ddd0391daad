//! In-process session store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::DatabaseError;
use crate::interview::InterviewState;

use super::SessionStore;

/// Keeps every session in a map. Lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, InterviewState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, conversation_id: &str) -> Result<Option<InterviewState>, DatabaseError> {
        Ok(self.sessions.read().await.get(conversation_id).cloned())
    }

    async fn save(&self, state: &InterviewState) -> Result<(), DatabaseError> {
        self.sessions
            .write()
            .await
            .insert(state.conversation_id().to_string(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_identifier_loads_none() {
        let store = MemoryStore::new();
        assert!(store.load("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_previous_state() {
        let store = MemoryStore::new();
        let mut state = InterviewState::new("a");
        store.save(&state).await.unwrap();

        state.continuation = Some("resp_1".into());
        store.save(&state).await.unwrap();

        assert_eq!(store.len().await, 1);
        let loaded = store.load("a").await.unwrap().unwrap();
        assert_eq!(loaded.continuation.as_deref(), Some("resp_1"));
    }
}
