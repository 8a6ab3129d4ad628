//! Bounded session store.
//!
//! Sessions are in-memory and never closed by clients in the common path, so
//! the store is capped: once the configured maximum is exceeded, the session
//! with the oldest insertion is evicted.  Message history is append-only.

use std::collections::{HashMap, VecDeque};

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::llm::types::Message;

/// Default maximum number of live sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

/// One conversation's state.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session id (UUID v7, so ids sort by creation time).
    pub id: String,
    /// Append-only message history.
    pub messages: Vec<Message>,
    /// Free-form metadata attached by callers.
    pub metadata: Map<String, Value>,
}

struct Inner {
    sessions: HashMap<String, Session>,
    /// Insertion order, oldest first.  Drives eviction.
    order: VecDeque<String>,
}

/// Owns per-session message history.
pub struct ConversationManager {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl ConversationManager {
    /// Create a store with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_SESSIONS)
    }

    /// Create a store holding at most `capacity` sessions.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                sessions: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Allocate a new empty session, evicting the oldest if at capacity.
    pub async fn create(&self) -> String {
        let id = Uuid::now_v7().to_string();
        let mut inner = self.inner.write().await;

        while inner.sessions.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.sessions.remove(&oldest);
                debug!(session = %oldest, "evicted oldest session");
            } else {
                break;
            }
        }

        inner.order.push_back(id.clone());
        inner.sessions.insert(
            id.clone(),
            Session {
                id: id.clone(),
                messages: Vec::new(),
                metadata: Map::new(),
            },
        );
        id
    }

    /// Append a message to a session.
    ///
    /// # Errors
    ///
    /// Fails when the session is unknown (never created, or evicted).
    pub async fn add_message(&self, session_id: &str, message: Message) -> Result<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| AgentError::UnknownSession {
                id: session_id.to_owned(),
            })?;
        session.messages.push(message);
        Ok(())
    }

    /// Snapshot a session's message history.
    ///
    /// # Errors
    ///
    /// Fails when the session is unknown.
    pub async fn messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let inner = self.inner.read().await;
        inner
            .sessions
            .get(session_id)
            .map(|s| s.messages.clone())
            .ok_or_else(|| AgentError::UnknownSession {
                id: session_id.to_owned(),
            })
    }

    /// Remove a session.  Returns whether it existed.
    pub async fn destroy(&self, session_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        inner.order.retain(|id| id != session_id);
        inner.sessions.remove(session_id).is_some()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    /// Whether no sessions are live.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ConversationManager {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_append_in_order() {
        let store = ConversationManager::new();
        let id = store.create().await;

        store.add_message(&id, Message::user("first")).await.unwrap();
        store.add_message(&id, Message::assistant("second")).await.unwrap();

        let messages = store.messages(&id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "first");
        assert_eq!(messages[1].content, "second");
    }

    #[tokio::test]
    async fn unknown_session_is_an_error() {
        let store = ConversationManager::new();
        let err = store
            .add_message("nope", Message::user("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::UnknownSession { .. }));
        assert!(store.messages("nope").await.is_err());
    }

    #[tokio::test]
    async fn destroy_removes_session() {
        let store = ConversationManager::new();
        let id = store.create().await;
        assert!(store.destroy(&id).await);
        assert!(!store.destroy(&id).await);
        assert!(store.messages(&id).await.is_err());
    }

    #[tokio::test]
    async fn capacity_evicts_oldest_insertion() {
        let store = ConversationManager::with_capacity(2);
        let first = store.create().await;
        let second = store.create().await;
        let third = store.create().await;

        assert_eq!(store.len().await, 2);
        assert!(store.messages(&first).await.is_err());
        assert!(store.messages(&second).await.is_ok());
        assert!(store.messages(&third).await.is_ok());
    }

    #[tokio::test]
    async fn eviction_order_ignores_activity() {
        // Oldest-insertion, not least-recently-used.
        let store = ConversationManager::with_capacity(2);
        let first = store.create().await;
        let second = store.create().await;

        store.add_message(&first, Message::user("still active")).await.unwrap();
        let _third = store.create().await;

        assert!(store.messages(&first).await.is_err());
        assert!(store.messages(&second).await.is_ok());
    }
}
