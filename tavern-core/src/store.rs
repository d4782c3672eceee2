//! Session persistence.
//!
//! Sessions persist as whole documents keyed by id: load, mutate in
//! memory, store the whole thing back. [`FileStore`] keeps one JSON file
//! per session; [`MemoryStore`] backs tests and ephemeral servers.

use crate::world::{GameSession, SessionId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

/// Errors from the persistence boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt session document: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("session {0} already exists")]
    AlreadyExists(SessionId),
}

/// Whole-document session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session, or None when the id is unknown.
    async fn load(&self, id: SessionId) -> Result<Option<GameSession>, StoreError>;

    /// Persist a brand-new session. Fails if the id already exists.
    async fn create(&self, session: &GameSession) -> Result<(), StoreError>;

    /// Replace the stored document for an existing session.
    async fn store(&self, session: &GameSession) -> Result<(), StoreError>;

    /// Remove a session. Deleting an unknown id is not an error.
    async fn delete(&self, id: SessionId) -> Result<(), StoreError>;
}

// ==== File-backed store ====

/// One pretty-printed JSON file per session under a base directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    fn path_for(&self, id: SessionId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn write_document(&self, session: &GameSession) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(session)?;
        tokio::fs::write(self.path_for(session.id), json).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn load(&self, id: SessionId) -> Result<Option<GameSession>, StoreError> {
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn create(&self, session: &GameSession) -> Result<(), StoreError> {
        if self.load(session.id).await?.is_some() {
            return Err(StoreError::AlreadyExists(session.id));
        }
        debug!(id = %session.id, "creating session file");
        self.write_document(session).await
    }

    async fn store(&self, session: &GameSession) -> Result<(), StoreError> {
        self.write_document(session).await
    }

    async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ==== In-memory store ====

/// Sessions held in a map; state is lost on drop.
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<SessionId, GameSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, id: SessionId) -> Result<Option<GameSession>, StoreError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn create(&self, session: &GameSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(StoreError::AlreadyExists(session.id));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn store(&self, session: &GameSession) -> Result<(), StoreError> {
        self.sessions.write().await.insert(session.id, session.clone());
        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
        self.sessions.write().await.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{create_sample_warrior, LocationType};
    use chrono::Utc;

    fn session() -> GameSession {
        GameSession {
            id: SessionId::new(),
            current_location: "The Infinite Tavern".to_string(),
            location_type: LocationType::Tavern,
            world_time: "Evening".to_string(),
            language: "English".to_string(),
            turn_number: 0,
            created_at: Utc::now(),
            in_combat: false,
            game_over: false,
            combat_xp_awarded: false,
            player: Some(create_sample_warrior("Bruni")),
            npcs: Vec::new(),
            enemies: Vec::new(),
            quests: Vec::new(),
            memories: Vec::new(),
            token_usage: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        let s = session();
        store.create(&s).await.unwrap();

        let loaded = store.load(s.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, s.id);
        assert_eq!(loaded.player.unwrap().name, "Bruni");

        assert!(store.load(SessionId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_rejects_duplicate_create() {
        let store = MemoryStore::new();
        let s = session();
        store.create(&s).await.unwrap();
        assert!(matches!(
            store.create(&s).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store_delete_is_idempotent() {
        let store = MemoryStore::new();
        let s = session();
        store.create(&s).await.unwrap();
        store.delete(s.id).await.unwrap();
        store.delete(s.id).await.unwrap();
        assert!(store.load(s.id).await.unwrap().is_none());
    }
}
