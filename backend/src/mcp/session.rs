//! MCP session management.
//!
//! Each session owns one [`SessionTransport`] behind an async mutex, so
//! messages for the same session are processed one at a time while different
//! sessions run in parallel. Sessions are identified by random v4 UUIDs.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::registry::CapabilityRegistry;
use super::transport::SessionTransport;

/// An MCP session.
pub struct McpSession {
    id: String,
    created_at: DateTime<Utc>,
    last_active: Mutex<Instant>,
    cancel: CancellationToken,
    transport: tokio::sync::Mutex<SessionTransport>,
}

impl McpSession {
    /// Create a new session with a fresh random ID.
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), registry)
    }

    pub fn with_id(id: impl Into<String>, registry: Arc<CapabilityRegistry>) -> Self {
        let id = id.into();
        let cancel = CancellationToken::new();
        let transport = SessionTransport::new(id.clone(), registry, cancel.clone());
        Self {
            id,
            created_at: Utc::now(),
            last_active: Mutex::new(Instant::now()),
            cancel,
            transport: tokio::sync::Mutex::new(transport),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Record activity on the session.
    pub fn touch(&self) {
        *self.last_active.lock() = Instant::now();
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        self.last_active.lock().elapsed()
    }

    /// Exclusive access to the session's transport.
    pub async fn transport(&self) -> tokio::sync::MutexGuard<'_, SessionTransport> {
        self.transport.lock().await
    }

    /// Cancel in-flight work, then close the transport once it is free.
    pub async fn close(&self) {
        self.cancel.cancel();
        self.transport.lock().await.close();
        debug!("MCP session {} closed", self.id);
    }
}

impl std::fmt::Debug for McpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpSession")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("idle_for", &self.idle_for())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("Session ID already in use: {0}")]
    Occupied(String),
}

/// Storage for live sessions.
///
/// Implementations must be safe for concurrent use; the HTTP layer calls
/// into the store from every request task.
pub trait SessionStore: Send + Sync {
    fn get(&self, id: &str) -> Option<Arc<McpSession>>;

    /// Insert a session. Fails if the ID is already taken.
    fn put(&self, session: Arc<McpSession>) -> Result<(), SessionStoreError>;

    fn remove(&self, id: &str) -> Option<Arc<McpSession>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every session idle for at least `max_idle`.
    fn drain_idle(&self, max_idle: Duration) -> Vec<Arc<McpSession>>;
}

/// Process-local session store.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Arc<McpSession>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, id: &str) -> Option<Arc<McpSession>> {
        self.sessions.read().get(id).cloned()
    }

    fn put(&self, session: Arc<McpSession>) -> Result<(), SessionStoreError> {
        match self.sessions.write().entry(session.id().to_string()) {
            Entry::Occupied(entry) => Err(SessionStoreError::Occupied(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(session);
                Ok(())
            }
        }
    }

    fn remove(&self, id: &str) -> Option<Arc<McpSession>> {
        self.sessions.write().remove(id)
    }

    fn len(&self) -> usize {
        self.sessions.read().len()
    }

    fn drain_idle(&self, max_idle: Duration) -> Vec<Arc<McpSession>> {
        let mut sessions = self.sessions.write();
        let idle: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| session.idle_for() >= max_idle)
            .map(|(id, _)| id.clone())
            .collect();
        idle.iter().filter_map(|id| sessions.remove(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::registry::ServerInfo;

    fn registry() -> Arc<CapabilityRegistry> {
        Arc::new(CapabilityRegistry::new(ServerInfo {
            name: "test".to_string(),
            version: "0.0.0".to_string(),
            instructions: None,
        }))
    }

    #[test]
    fn test_session_ids_are_uuids() {
        let a = McpSession::new(registry());
        let b = McpSession::new(registry());
        assert_ne!(a.id(), b.id());
        assert!(Uuid::parse_str(a.id()).is_ok());
    }

    #[test]
    fn test_put_rejects_duplicate_ids() {
        let store = InMemorySessionStore::new();
        store
            .put(Arc::new(McpSession::with_id("same", registry())))
            .unwrap();
        let err = store
            .put(Arc::new(McpSession::with_id("same", registry())))
            .unwrap_err();
        assert!(matches!(err, SessionStoreError::Occupied(id) if id == "same"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_and_remove() {
        let store = InMemorySessionStore::new();
        let session = Arc::new(McpSession::new(registry()));
        let id = session.id().to_string();
        store.put(session).unwrap();

        assert!(store.get(&id).is_some());
        assert!(store.remove(&id).is_some());
        assert!(store.get(&id).is_none());
        assert!(store.remove(&id).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_drain_idle() {
        let store = InMemorySessionStore::new();
        let stale = Arc::new(McpSession::with_id("stale", registry()));
        store.put(stale).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let fresh = Arc::new(McpSession::with_id("fresh", registry()));
        store.put(fresh).unwrap();

        let removed = store.drain_idle(Duration::from_millis(20));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id(), "stale");
        assert!(store.get("fresh").is_some());
    }

    #[tokio::test]
    async fn test_close_closes_transport() {
        let session = McpSession::new(registry());
        session.close().await;
        assert!(session.transport().await.is_closed());
    }
}
