use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{ModelConfig, Session};

type SessionSlot = Arc<Mutex<Session>>;

/// Process-wide map of live sessions.
///
/// The map lock is held only to look up or insert a slot; each session has
/// its own lock, held only for the duration of a synchronous closure.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, SessionSlot>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session and return a snapshot of it.
    pub fn create(&self, model_config: ModelConfig) -> Session {
        let session = Session::new(model_config);
        let snapshot = session.clone();
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id, Arc::new(Mutex::new(session)));
        snapshot
    }

    fn slot(&self, id: Uuid) -> Option<SessionSlot> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Snapshot of a session.
    pub fn get(&self, id: Uuid) -> Option<Session> {
        self.with_lock(id, |s| s.clone())
    }

    /// Run `f` with exclusive access to one session. `None` if the id is
    /// unknown or was evicted.
    pub fn with_lock<R>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let slot = self.slot(id)?;
        let mut session = slot.lock().unwrap_or_else(PoisonError::into_inner);
        Some(f(&mut *session))
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.slot(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop sessions idle for longer than `ttl`. Returns how many were removed.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, slot| {
            let session = slot.lock().unwrap_or_else(PoisonError::into_inner);
            let idle = (now - session.last_active).to_std().unwrap_or_default();
            idle <= ttl
        });
        before - sessions.len()
    }
}

/// Periodically evict idle sessions until the runtime shuts down.
pub fn spawn_eviction(store: SessionStore, ttl: Duration) -> JoinHandle<()> {
    let period = (ttl / 2).clamp(Duration::from_secs(1), Duration::from_secs(60));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = store.evict_idle(ttl);
            if evicted > 0 {
                info!("Evicted {} idle session(s)", evicted);
            } else {
                debug!("No idle sessions to evict");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_only_idle_sessions() {
        let store = SessionStore::new();
        let stale = store.create(ModelConfig::default()).id;
        let fresh = store.create(ModelConfig::default()).id;

        store.with_lock(stale, |s| s.last_active = Utc::now() - chrono::Duration::hours(2));

        assert_eq!(store.evict_idle(Duration::from_secs(3600)), 1);
        assert!(!store.contains(stale));
        assert!(store.contains(fresh));
    }

    #[test]
    fn with_lock_on_unknown_id_is_none() {
        let store = SessionStore::new();
        assert!(store.with_lock(Uuid::new_v4(), |_| ()).is_none());
    }
}
