//! Session persistence, keyed by conversation identifier.

pub mod libsql_backend;
pub mod memory;
mod migrations;

pub use libsql_backend::LibSqlBackend;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::interview::InterviewState;

/// Loads and saves interview state.
///
/// Implementations must round-trip turn order and the continuation token
/// without loss.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// State for `conversation_id`, or `None` if the identifier is new.
    async fn load(&self, conversation_id: &str) -> Result<Option<InterviewState>, DatabaseError>;

    /// Insert or replace the state for its conversation identifier.
    async fn save(&self, state: &InterviewState) -> Result<(), DatabaseError>;
}
