//! libSQL backend for interview sessions.
//!
//! Each conversation is one row; the full `InterviewState` is stored as JSON
//! alongside its phase for inspection. Supports local file and in-memory
//! databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::interview::InterviewState;
use crate::store::SessionStore;
use crate::store::migrations;

/// libSQL session store.
///
/// Holds a single connection reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Session database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }
}

#[async_trait]
impl SessionStore for LibSqlBackend {
    async fn load(&self, conversation_id: &str) -> Result<Option<InterviewState>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT state FROM interview_sessions WHERE conversation_id = ?1",
                params![conversation_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_session: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let json: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("load_session row parse: {e}")))?;
                let state = serde_json::from_str(&json)
                    .map_err(|e| DatabaseError::Serialization(format!("load_session: {e}")))?;
                Ok(Some(state))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("load_session: {e}"))),
        }
    }

    async fn save(&self, state: &InterviewState) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(state)
            .map_err(|e| DatabaseError::Serialization(format!("save_session: {e}")))?;

        self.conn
            .execute(
                "INSERT INTO interview_sessions (conversation_id, phase, state, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(conversation_id) DO UPDATE SET
                    phase = excluded.phase,
                    state = excluded.state,
                    updated_at = excluded.updated_at",
                params![
                    state.conversation_id(),
                    state.phase().to_string(),
                    json,
                    state.updated_at.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_session: {e}")))?;

        debug!(
            conversation_id = %state.conversation_id(),
            phase = %state.phase(),
            turns = state.conversation().len(),
            "Session saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::{InterviewPhase, Turn};

    fn sample_state(id: &str) -> InterviewState {
        let mut state = InterviewState::new(id);
        state.conversation_mut().append(Turn::user("We grow mushrooms"));
        state
            .conversation_mut()
            .append(Turn::assistant("Who are your customers?"));
        state.conversation_mut().append(Turn::user("Restaurants"));
        state.continuation = Some("resp_42".into());
        state
    }

    #[tokio::test]
    async fn load_missing_returns_none() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        assert!(db.load("whatsapp:+1000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_and_load_round_trips_order_and_token() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let state = sample_state("whatsapp:+1000");
        db.save(&state).await.unwrap();

        let loaded = db.load("whatsapp:+1000").await.unwrap().unwrap();
        assert_eq!(loaded, state);
        let contents: Vec<&str> = loaded
            .conversation()
            .turns()
            .iter()
            .map(|t| t.content())
            .collect();
        assert_eq!(
            contents,
            vec!["We grow mushrooms", "Who are your customers?", "Restaurants"]
        );
    }

    #[tokio::test]
    async fn save_upserts_by_identifier() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let mut state = sample_state("a");
        db.save(&state).await.unwrap();

        state.transition_to(InterviewPhase::Generating).unwrap();
        db.save(&state).await.unwrap();
        db.save(&sample_state("b")).await.unwrap();

        let a = db.load("a").await.unwrap().unwrap();
        let b = db.load("b").await.unwrap().unwrap();
        assert_eq!(a.phase(), InterviewPhase::Generating);
        assert_eq!(b.phase(), InterviewPhase::Collecting);
    }

    #[tokio::test]
    async fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.db");

        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.save(&sample_state("persisted")).await.unwrap();
        }

        let db = LibSqlBackend::new_local(&path).await.unwrap();
        let loaded = db.load("persisted").await.unwrap().unwrap();
        assert_eq!(loaded.conversation().len(), 3);
    }
}
