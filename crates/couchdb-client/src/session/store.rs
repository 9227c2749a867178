//! Per-client session storage
//!
//! The store has two states: empty (unauthenticated) and holding a session.
//! It never demotes itself on expiry. Callers check [`SessionStore::usable`],
//! and an expired session is simply overwritten by the next login. A session
//! whose cookie the server rejected is dropped with [`SessionStore::invalidate`].

use super::Session;
use parking_lot::RwLock;
use std::sync::Arc;

/// Holder of the current session of one client
#[derive(Debug, Default)]
pub struct SessionStore {
    current: RwLock<Option<Arc<Session>>>,
}

impl SessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// The current session, usable or not
    pub fn current(&self) -> Option<Arc<Session>> {
        self.current.read().clone()
    }

    /// The current session if its cookie has not expired
    pub fn usable(&self) -> Option<Arc<Session>> {
        self.current().filter(|session| session.is_usable())
    }

    /// Check whether a usable session is present
    pub fn is_authenticated(&self) -> bool {
        self.usable().is_some()
    }

    /// `Cookie` header value of the current session, expired or not
    pub fn cookie_header(&self) -> Option<String> {
        self.current
            .read()
            .as_ref()
            .and_then(|session| session.cookie_header().map(str::to_string))
    }

    /// Replace the current session, returning the one it displaced
    pub fn replace(&self, session: Arc<Session>) -> Option<Arc<Session>> {
        self.current.write().replace(session)
    }

    /// Drop the current session if it is still `session`
    ///
    /// Returns `false` when another login has already replaced it, in which
    /// case the newer session is kept.
    pub fn invalidate(&self, session: &Arc<Session>) -> bool {
        let mut current = self.current.write();
        match current.as_ref() {
            Some(held) if Arc::ptr_eq(held, session) => {
                *current = None;
                true
            }
            _ => false,
        }
    }
}
