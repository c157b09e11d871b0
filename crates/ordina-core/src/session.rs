use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use ordina_schema::Message;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(Uuid),
}

/// In-memory conversation history, keyed by session id. Appends are
/// append-only; messages are never rewritten. Lifetime is the process
/// lifetime unless a session is explicitly cleared.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Vec<Message>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.write().await.insert(id, Vec::new());
        tracing::debug!(session_id = %id, "created session");
        id
    }

    pub async fn exists(&self, id: Uuid) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    pub async fn get(&self, id: Uuid) -> Result<Vec<Message>, SessionError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    pub async fn append(&self, id: Uuid, message: Message) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let history = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        history.push(message);
        Ok(())
    }

    pub async fn message_count(&self, id: Uuid) -> Result<usize, SessionError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .map(Vec::len)
            .ok_or(SessionError::NotFound(id))
    }

    /// Drop a session and its history entirely.
    pub async fn clear(&self, id: Uuid) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(SessionError::NotFound(id))
    }
}
