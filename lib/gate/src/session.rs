//! Session storage used by the gate.
//!
//! The store holds the flow state attribute, the notes a host reads after
//! login, the pending request snapshot, and the established principal.
//! Every mutation the gate relies on for ordering goes through
//! [`SessionStore::replace_attribute`], which is compare-and-swap.

use crate::error::SessionStoreError;
use crate::snapshot::RequestSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use openid_gate_core::{Result, SessionId, SnapshotId};
use openid_gate_identity::Principal;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Storage for per-session gate data.
///
/// Operations on an unknown session behave as if the session existed and
/// was empty; writes create it.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Reads a session attribute.
    async fn attribute(
        &self,
        session: SessionId,
        name: &str,
    ) -> Result<Option<String>, SessionStoreError>;

    /// Replaces an attribute if its current value equals `expected`.
    ///
    /// `None` means absent on both sides. Returns whether the swap happened.
    async fn replace_attribute(
        &self,
        session: SessionId,
        name: &str,
        expected: Option<&str>,
        value: Option<String>,
    ) -> Result<bool, SessionStoreError>;

    /// Writes a note.
    async fn set_note(
        &self,
        session: SessionId,
        name: &str,
        value: String,
    ) -> Result<(), SessionStoreError>;

    /// Reads a note.
    async fn note(
        &self,
        session: SessionId,
        name: &str,
    ) -> Result<Option<String>, SessionStoreError>;

    /// Stores the session's snapshot, replacing any earlier one.
    async fn put_snapshot(
        &self,
        session: SessionId,
        snapshot: RequestSnapshot,
    ) -> Result<(), SessionStoreError>;

    /// Returns the id of the session's snapshot.
    async fn snapshot_id(
        &self,
        session: SessionId,
    ) -> Result<Option<SnapshotId>, SessionStoreError>;

    /// Removes and returns the snapshot if its id is `id`.
    async fn take_snapshot(
        &self,
        session: SessionId,
        id: SnapshotId,
    ) -> Result<Option<RequestSnapshot>, SessionStoreError>;

    /// Removes the session's snapshot, if any.
    async fn discard_snapshot(&self, session: SessionId) -> Result<(), SessionStoreError>;

    /// Returns the principal attached to the session.
    async fn principal(
        &self,
        session: SessionId,
    ) -> Result<Option<Principal>, SessionStoreError>;

    /// Attaches a principal to the session.
    async fn set_principal(
        &self,
        session: SessionId,
        principal: Principal,
    ) -> Result<(), SessionStoreError>;

    /// Drops everything stored for the session.
    async fn invalidate(&self, session: SessionId) -> Result<(), SessionStoreError>;
}

#[derive(Debug)]
struct SessionData {
    attributes: HashMap<String, String>,
    notes: HashMap<String, String>,
    snapshot: Option<RequestSnapshot>,
    principal: Option<Principal>,
    last_accessed: DateTime<Utc>,
}

impl SessionData {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            attributes: HashMap::new(),
            notes: HashMap::new(),
            snapshot: None,
            principal: None,
            last_accessed: now,
        }
    }
}

/// Process-local session store.
///
/// Sessions idle for longer than `max_inactive` are treated as absent and
/// dropped on next access or by [`InMemorySessionStore::purge_expired`].
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionData>>,
    max_inactive: Duration,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::minutes(30))
    }
}

impl InMemorySessionStore {
    /// Creates a store expiring sessions after `max_inactive` idle time.
    #[must_use]
    pub fn new(max_inactive: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_inactive,
        }
    }

    /// Returns the idle timeout.
    #[must_use]
    pub fn max_inactive(&self) -> Duration {
        self.max_inactive
    }

    /// Removes expired sessions and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `SessionStoreError::Poisoned` if the lock is poisoned.
    pub fn purge_expired(&self) -> Result<usize, SessionStoreError> {
        let cutoff = Utc::now() - self.max_inactive;
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| SessionStoreError::Poisoned)?;
        let before = sessions.len();
        sessions.retain(|_, data| data.last_accessed >= cutoff);
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, "purged expired sessions");
        }
        Ok(removed)
    }

    /// Returns the number of live sessions.
    ///
    /// # Errors
    ///
    /// Returns `SessionStoreError::Poisoned` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, SessionStoreError> {
        let cutoff = Utc::now() - self.max_inactive;
        let sessions = self
            .sessions
            .read()
            .map_err(|_| SessionStoreError::Poisoned)?;
        Ok(sessions
            .values()
            .filter(|data| data.last_accessed >= cutoff)
            .count())
    }

    /// Runs `f` on the live session, creating it if needed.
    fn with_session<T>(
        &self,
        session: SessionId,
        f: impl FnOnce(&mut SessionData) -> T,
    ) -> Result<T, SessionStoreError> {
        let now = Utc::now();
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| SessionStoreError::Poisoned)?;
        let data = sessions
            .entry(session)
            .or_insert_with(|| SessionData::new(now));
        if now - data.last_accessed > self.max_inactive {
            debug!(%session, "session expired");
            *data = SessionData::new(now);
        }
        data.last_accessed = now;
        Ok(f(data))
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn attribute(
        &self,
        session: SessionId,
        name: &str,
    ) -> Result<Option<String>, SessionStoreError> {
        self.with_session(session, |data| data.attributes.get(name).cloned())
    }

    async fn replace_attribute(
        &self,
        session: SessionId,
        name: &str,
        expected: Option<&str>,
        value: Option<String>,
    ) -> Result<bool, SessionStoreError> {
        self.with_session(session, |data| {
            if data.attributes.get(name).map(String::as_str) != expected {
                return false;
            }
            match value {
                Some(value) => data.attributes.insert(name.to_string(), value),
                None => data.attributes.remove(name),
            };
            true
        })
    }

    async fn set_note(
        &self,
        session: SessionId,
        name: &str,
        value: String,
    ) -> Result<(), SessionStoreError> {
        self.with_session(session, |data| {
            data.notes.insert(name.to_string(), value);
        })
    }

    async fn note(
        &self,
        session: SessionId,
        name: &str,
    ) -> Result<Option<String>, SessionStoreError> {
        self.with_session(session, |data| data.notes.get(name).cloned())
    }

    async fn put_snapshot(
        &self,
        session: SessionId,
        snapshot: RequestSnapshot,
    ) -> Result<(), SessionStoreError> {
        self.with_session(session, |data| data.snapshot = Some(snapshot))
    }

    async fn snapshot_id(
        &self,
        session: SessionId,
    ) -> Result<Option<SnapshotId>, SessionStoreError> {
        self.with_session(session, |data| data.snapshot.as_ref().map(RequestSnapshot::id))
    }

    async fn take_snapshot(
        &self,
        session: SessionId,
        id: SnapshotId,
    ) -> Result<Option<RequestSnapshot>, SessionStoreError> {
        self.with_session(session, |data| {
            if data.snapshot.as_ref().map(RequestSnapshot::id) == Some(id) {
                data.snapshot.take()
            } else {
                None
            }
        })
    }

    async fn discard_snapshot(&self, session: SessionId) -> Result<(), SessionStoreError> {
        self.with_session(session, |data| data.snapshot = None)
    }

    async fn principal(
        &self,
        session: SessionId,
    ) -> Result<Option<Principal>, SessionStoreError> {
        self.with_session(session, |data| data.principal.clone())
    }

    async fn set_principal(
        &self,
        session: SessionId,
        principal: Principal,
    ) -> Result<(), SessionStoreError> {
        self.with_session(session, |data| data.principal = Some(principal))
    }

    async fn invalidate(&self, session: SessionId) -> Result<(), SessionStoreError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| SessionStoreError::Poisoned)?;
        if sessions.remove(&session).is_some() {
            debug!(%session, "session invalidated");
        }
        Ok(())
    }
}
