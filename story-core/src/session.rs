//! Multi-session front-end API.
//!
//! `SessionManager` keeps many independent stories behind an injected
//! `SessionStore`. Each call loads one story, runs a single engine operation
//! on it and writes it back only if the operation succeeded.

use crate::engine::{EngineError, StoryEngine};
use crate::scene::{Genre, ImageRef};
use crate::state::StoryState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Identifier of one story session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors from session operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no session with id {0}")]
    NotFound(SessionId),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Storage for story states, keyed by session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: SessionId) -> Option<StoryState>;
    async fn put(&self, id: SessionId, state: StoryState);
    /// Returns whether a session was removed.
    async fn delete(&self, id: SessionId) -> bool;
}

/// A process-local session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, StoryState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: SessionId) -> Option<StoryState> {
        self.sessions.read().await.get(&id).cloned()
    }

    async fn put(&self, id: SessionId, state: StoryState) {
        self.sessions.write().await.insert(id, state);
    }

    async fn delete(&self, id: SessionId) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }
}

/// Runs engine operations against stored sessions.
///
/// Operations on different sessions are independent. Callers must not issue
/// overlapping operations on the same session.
pub struct SessionManager {
    engine: StoryEngine,
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    /// `engine` is used as a template; any story it holds is ignored.
    pub fn new(engine: StoryEngine, store: Arc<dyn SessionStore>) -> Self {
        Self {
            engine: engine.detached(),
            store,
        }
    }

    fn engine_for(&self, state: Option<StoryState>) -> StoryEngine {
        let mut engine = self.engine.detached();
        if let Some(state) = state {
            engine.resume(state);
        }
        engine
    }

    async fn load(&self, id: SessionId) -> Result<StoryEngine, SessionError> {
        let state = self.store.get(id).await.ok_or(SessionError::NotFound(id))?;
        Ok(self.engine_for(Some(state)))
    }

    async fn commit(&self, id: SessionId, engine: StoryEngine) -> Result<StoryState, SessionError> {
        let state = engine.into_state().ok_or(EngineError::NoActiveStory)?;
        self.store.put(id, state.clone()).await;
        Ok(state)
    }

    /// Start a story in a new session.
    pub async fn start(
        &self,
        image: ImageRef,
        genre: Option<Genre>,
    ) -> Result<(SessionId, StoryState), SessionError> {
        let mut engine = self.engine_for(None);
        engine.start(image, genre).await?;

        let id = SessionId::new();
        let state = self.commit(id, engine).await?;
        tracing::info!(session = %id, "session started");
        Ok((id, state))
    }

    pub async fn advance(&self, id: SessionId, choice_id: &str) -> Result<StoryState, SessionError> {
        let mut engine = self.load(id).await?;
        engine.advance(choice_id).await?;
        self.commit(id, engine).await
    }

    pub async fn rollback(&self, id: SessionId, target: usize) -> Result<StoryState, SessionError> {
        let mut engine = self.load(id).await?;
        engine.rollback(target)?;
        self.commit(id, engine).await
    }

    pub async fn state(&self, id: SessionId) -> Result<StoryState, SessionError> {
        self.store.get(id).await.ok_or(SessionError::NotFound(id))
    }

    /// Drop a session.
    pub async fn end(&self, id: SessionId) -> Result<(), SessionError> {
        if self.store.delete(id).await {
            tracing::info!(session = %id, "session ended");
            Ok(())
        } else {
            Err(SessionError::NotFound(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemorySessionStore::new();
        let id = SessionId::new();
        assert!(store.get(id).await.is_none());
        assert!(!store.delete(id).await);
        assert!(store.is_empty().await);
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
