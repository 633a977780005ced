//! Explicit session side table.
//!
//! Live sessions are tracked in a slotmap keyed by opaque [`SessionId`]s.
//! Teardown is explicit: removing a session drops its state graph,
//! template store, and pending work, with no reliance on collector-driven
//! cleanup.

use slotmap::{new_key_type, SlotMap};

use crate::config::Config;
use crate::session::Session;

new_key_type! {
    /// Opaque handle for a registered session. Copy, lightweight (u64).
    pub struct SessionId;
}

/// Registry of live document sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: SlotMap<SessionId, Session>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: SlotMap::with_key(),
        }
    }

    /// Create and register a session with the given config.
    pub fn create(&mut self, config: Config) -> SessionId {
        let id = self.sessions.insert(Session::new(config));
        tracing::debug!(target: "weft::registry", ?id, "session registered");
        id
    }

    /// Register an existing session.
    pub fn insert(&mut self, session: Session) -> SessionId {
        self.sessions.insert(session)
    }

    /// Immutable access to a session.
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Mutable access to a session.
    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Tear a session down, dropping its state graph, template store, and
    /// pending work. Returns whether the session existed.
    pub fn teardown(&mut self, id: SessionId) -> bool {
        let existed = self.sessions.remove(id).is_some();
        if existed {
            tracing::debug!(target: "weft::registry", ?id, "session torn down");
        }
        existed
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
