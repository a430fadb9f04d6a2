use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use super::error::GameError;
use super::types::{Session, SessionId};

const LOG_TARGET: &str = "chain_audit::game::session_store";

struct SessionSlot {
    session: Session,
    retired: bool,
}

/// Live sessions keyed by id. Each session sits behind its own lock, so
/// operations on one session serialize while different sessions proceed in
/// parallel; the map itself is only touched to look up or drop a handle.
pub struct SessionStore {
    sessions: DashMap<SessionId, Arc<Mutex<SessionSlot>>>,
    next_id: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Ids are handed out strictly increasing; an id reserved for a create
    /// that later fails is never reused.
    pub fn allocate_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn insert(&self, session: Session) {
        let id = session.session_id;
        self.sessions.insert(
            id,
            Arc::new(Mutex::new(SessionSlot {
                session,
                retired: false,
            })),
        );
        debug!(
            target: LOG_TARGET,
            session_id = id,
            total_sessions = self.sessions.len(),
            "inserted session"
        );
    }

    /// Acquire exclusive access to a live session. Fails with
    /// `SessionNotFound` if it never existed or was retired while we waited.
    pub async fn lock(&self, id: SessionId) -> Result<SessionGuard<'_>, GameError> {
        let handle = self
            .sessions
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(GameError::SessionNotFound(id))?;
        let slot = handle.lock_owned().await;
        if slot.retired {
            return Err(GameError::SessionNotFound(id));
        }
        Ok(SessionGuard { store: self, slot })
    }

    pub async fn snapshot(&self, id: SessionId) -> Option<Session> {
        self.lock(id).await.ok().map(|guard| (*guard).clone())
    }

    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SessionGuard<'a> {
    store: &'a SessionStore,
    slot: OwnedMutexGuard<SessionSlot>,
}

impl SessionGuard<'_> {
    /// Removes the session from the store while still holding its lock, so
    /// anyone queued behind us observes `SessionNotFound`.
    pub fn retire(mut self) -> Session {
        self.slot.retired = true;
        let id = self.slot.session.session_id;
        self.store.sessions.remove(&id);
        info!(
            target: LOG_TARGET,
            session_id = id,
            remaining_sessions = self.store.sessions.len(),
            "retired session"
        );
        self.slot.session.clone()
    }
}

impl Deref for SessionGuard<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.slot.session
    }
}

impl DerefMut for SessionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.slot.session
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::game::types::{Phase, SessionMember};

    fn session(id: SessionId) -> Session {
        Session::new(id, 1, SessionMember::joined("a".into(), "A"), Utc::now())
    }

    #[test]
    fn ids_are_monotonic() {
        let store = SessionStore::new();
        let first = store.allocate_id();
        let second = store.allocate_id();
        assert!(second > first);
    }

    #[tokio::test]
    async fn mutations_through_guard_persist() {
        let store = SessionStore::new();
        store.insert(session(1));
        {
            let mut guard = store.lock(1).await.unwrap();
            guard.phase = Phase::Playing;
        }
        assert_eq!(store.snapshot(1).await.unwrap().phase, Phase::Playing);
    }

    #[tokio::test]
    async fn retired_session_is_gone_for_waiters() {
        let store = Arc::new(SessionStore::new());
        store.insert(session(3));
        store.insert(session(2));
        assert_eq!(store.ids(), vec![2, 3]);

        let guard = store.lock(3).await.unwrap();
        let handle = store.sessions.get(&3).map(|e| Arc::clone(e.value())).unwrap();
        let retired = guard.retire();
        assert_eq!(retired.session_id, 3);

        assert!(handle.lock().await.retired);
        assert!(matches!(
            store.lock(3).await,
            Err(GameError::SessionNotFound(3))
        ));
        assert_eq!(store.ids(), vec![2]);
        store.lock(2).await.unwrap().retire();
        assert!(store.is_empty());
    }
}
