//! Routes incoming messages to sessions.
//!
//! A message without a session ID may only be `initialize`, which opens a new
//! session. A message with a session ID is handed to that session's transport.
//! Everything else is rejected before any protocol processing happens.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::protocol::{JsonRpcRequest, JsonRpcResponse};
use super::registry::CapabilityRegistry;
use super::session::{McpSession, SessionStore, SessionStoreError};

/// Attempts at minting a session ID before giving up.
const MAX_MINT_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Session not found: {0}")]
    UnknownSession(String),
    #[error("Missing Mcp-Session-Id header; only initialize may start a session")]
    SessionRequired,
    #[error("Failed to register session: {0}")]
    Store(#[from] SessionStoreError),
}

/// Outcome of routing one message.
#[derive(Debug)]
pub struct Routed {
    /// `None` when the message was a notification
    pub response: Option<JsonRpcResponse>,
    /// Set when this message opened a new session
    pub created_session: Option<String>,
}

#[derive(Clone)]
pub struct SessionRouter {
    store: Arc<dyn SessionStore>,
    registry: Arc<CapabilityRegistry>,
}

impl SessionRouter {
    pub fn new(store: Arc<dyn SessionStore>, registry: Arc<CapabilityRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn session_count(&self) -> usize {
        self.store.len()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.store.get(session_id).is_some()
    }

    pub async fn route(
        &self,
        session_id: Option<&str>,
        message: JsonRpcRequest,
    ) -> Result<Routed, RoutingError> {
        match session_id {
            Some(id) => self.resume(id, message).await,
            None if message.is_initialize() => self.open(message).await,
            None => {
                debug!("MCP: Rejecting {} without session", message.method);
                Err(RoutingError::SessionRequired)
            }
        }
    }

    async fn resume(&self, id: &str, message: JsonRpcRequest) -> Result<Routed, RoutingError> {
        let session = self
            .store
            .get(id)
            .ok_or_else(|| RoutingError::UnknownSession(id.to_string()))?;
        session.touch();

        let mut transport = session.transport().await;
        // Torn down while this request waited for the lock
        if transport.is_closed() {
            return Err(RoutingError::UnknownSession(id.to_string()));
        }
        let response = transport.handle_message(message).await;
        drop(transport);

        session.touch();
        Ok(Routed {
            response,
            created_session: None,
        })
    }

    async fn open(&self, message: JsonRpcRequest) -> Result<Routed, RoutingError> {
        let session = self.mint()?;

        let (response, initialized) = {
            let mut transport = session.transport().await;
            let response = transport.handle_message(message).await;
            (response, transport.is_initialized())
        };

        if !initialized {
            self.store.remove(session.id());
            session.close().await;
            debug!("MCP: Initialize failed, discarded session {}", session.id());
            return Ok(Routed {
                response,
                created_session: None,
            });
        }

        info!("MCP: New session initialized: {}", session.id());
        Ok(Routed {
            response,
            created_session: Some(session.id().to_string()),
        })
    }

    fn mint(&self) -> Result<Arc<McpSession>, RoutingError> {
        let mut attempt = 1;
        loop {
            let session = Arc::new(McpSession::new(self.registry.clone()));
            match self.store.put(session.clone()) {
                Ok(()) => return Ok(session),
                Err(e) if attempt < MAX_MINT_ATTEMPTS => {
                    warn!("MCP: {}, retrying", e);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Tear down a session. Unknown or missing IDs are a no-op.
    ///
    /// Returns whether a session was actually removed.
    pub async fn teardown(&self, session_id: Option<&str>) -> bool {
        let Some(id) = session_id else {
            debug!("MCP: Teardown without session ID");
            return false;
        };
        match self.store.remove(id) {
            Some(session) => {
                session.close().await;
                info!("MCP: Session terminated: {}", id);
                true
            }
            None => {
                debug!("MCP: Teardown of unknown session {}", id);
                false
            }
        }
    }

    /// Close every session idle for at least `max_idle`.
    pub async fn expire_idle(&self, max_idle: Duration) -> usize {
        let expired = self.store.drain_idle(max_idle);
        futures::future::join_all(expired.iter().map(|session| session.close())).await;
        for session in &expired {
            info!(
                "MCP: Expired idle session {} (created {})",
                session.id(),
                session.created_at().to_rfc3339()
            );
        }
        expired.len()
    }

    /// Periodically expire idle sessions.
    pub fn spawn_idle_sweeper(&self, max_idle: Duration, interval: Duration) -> JoinHandle<()> {
        let router = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let expired = router.expire_idle(max_idle).await;
                if expired > 0 {
                    debug!(
                        "MCP: Sweeper expired {} sessions, {} remain",
                        expired,
                        router.session_count()
                    );
                }
            }
        })
    }
}
