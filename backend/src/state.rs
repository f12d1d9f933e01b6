//! Application state management.

use cv_mcp_types::Profile;
use std::sync::Arc;

use crate::email::EmailSender;
use crate::mcp::{build_registry, InMemorySessionStore, SessionRouter, SessionStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// CV loaded at startup, read-only afterwards
    profile: Arc<Profile>,
    /// Delegate behind the send-email tool and REST route
    mailer: Arc<dyn EmailSender>,
    /// Live MCP sessions
    sessions: SessionRouter,
}

impl AppState {
    /// Create new application state with an in-memory session store.
    pub fn new(profile: Profile, mailer: Arc<dyn EmailSender>) -> Self {
        Self::with_store(profile, mailer, Arc::new(InMemorySessionStore::new()))
    }

    /// Create new application state with the given session store.
    pub fn with_store(
        profile: Profile,
        mailer: Arc<dyn EmailSender>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let profile = Arc::new(profile);
        let registry = Arc::new(build_registry(profile.clone(), mailer.clone()));
        Self {
            inner: Arc::new(AppStateInner {
                profile,
                mailer,
                sessions: SessionRouter::new(store, registry),
            }),
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.inner.profile
    }

    pub fn mailer(&self) -> &Arc<dyn EmailSender> {
        &self.inner.mailer
    }

    /// Get the MCP session router.
    pub fn sessions(&self) -> &SessionRouter {
        &self.inner.sessions
    }
}
