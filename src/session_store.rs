//! In-memory registry of study sessions.

use crate::session::{Phase, Session, SessionHandle};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry {
    handle: SessionHandle,
    last_touched: Instant,
}

/// Sessions keyed by id. Nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh idle session and return its handle.
    pub fn create(&self) -> SessionHandle {
        let session = Session::new();
        let id = session.id().to_string();
        let handle = Arc::new(RwLock::new(session));
        let entry = Entry {
            handle: handle.clone(),
            last_touched: Instant::now(),
        };
        self.inner.write().unwrap().insert(id.clone(), entry);
        tracing::debug!("SessionStore: created '{}'", id);
        handle
    }

    /// Look up a session and mark it as recently used.
    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        let mut sessions = self.inner.write().unwrap();
        let entry = sessions.get_mut(id)?;
        entry.last_touched = Instant::now();
        Some(entry.handle.clone())
    }

    /// Drop a session. A pipeline still running for it finishes on its own
    /// handle and its outcome is discarded.
    pub fn remove(&self, id: &str) -> bool {
        self.inner.write().unwrap().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    /// Drop sessions untouched for longer than `max_idle`. Sessions with a
    /// pipeline in flight are kept. Returns how many were dropped.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        self.evict_idle_at(Instant::now(), max_idle)
    }

    fn evict_idle_at(&self, now: Instant, max_idle: Duration) -> usize {
        let mut sessions = self.inner.write().unwrap();
        let before = sessions.len();
        sessions.retain(|id, entry| {
            if now.saturating_duration_since(entry.last_touched) <= max_idle {
                return true;
            }
            // try_read: a handler holding the write lock is using it right now.
            let busy = match entry.handle.try_read() {
                Ok(session) => matches!(session.phase(), Phase::Extracting | Phase::Generating),
                Err(_) => true,
            };
            if !busy {
                tracing::debug!("SessionStore: evicted idle '{}'", id);
            }
            busy
        });
        before - sessions.len()
    }

    /// Periodically evict idle sessions until the runtime shuts down.
    pub fn spawn_sweeper(&self, max_idle: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        let period = (max_idle / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let evicted = store.evict_idle(max_idle);
                if evicted > 0 {
                    tracing::info!(
                        "Evicted {} idle sessions ({} active)",
                        evicted,
                        store.len()
                    );
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DocumentInfo;

    const IDLE: Duration = Duration::from_secs(60);

    fn id_of(handle: &SessionHandle) -> String {
        handle.read().unwrap().id().to_string()
    }

    #[test]
    fn test_create_and_get() {
        let store = SessionStore::new();
        let handle = store.create();
        let id = id_of(&handle);

        let fetched = store.get(&id).unwrap();
        assert!(Arc::ptr_eq(&handle, &fetched));
        assert_eq!(fetched.read().unwrap().phase(), Phase::Idle);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sessions_are_independent() {
        let store = SessionStore::new();
        let a = store.create();
        let b = store.create();
        assert_ne!(a.read().unwrap().id(), b.read().unwrap().id());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_remove() {
        let store = SessionStore::new();
        let id = id_of(&store.create());
        assert!(store.remove(&id));
        assert!(!store.remove(&id));
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn test_expired_session_is_evicted() {
        let store = SessionStore::new();
        let id = id_of(&store.create());

        assert_eq!(store.evict_idle_at(Instant::now(), IDLE), 0);
        assert_eq!(store.evict_idle_at(Instant::now() + IDLE * 2, IDLE), 1);
        assert!(store.get(&id).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_busy_session_survives_eviction() {
        let store = SessionStore::new();
        let busy = store.create();
        busy.write()
            .unwrap()
            .begin_upload(DocumentInfo {
                filename: "notes.png".into(),
                media_type: "image/png".into(),
                size_bytes: 4,
                sha256: "00".into(),
            })
            .unwrap();
        let idle = id_of(&store.create());

        assert_eq!(store.evict_idle_at(Instant::now() + IDLE * 2, IDLE), 1);
        assert!(store.get(&id_of(&busy)).is_some());
        assert!(store.get(&idle).is_none());
    }

    #[test]
    fn test_get_refreshes_last_touched() {
        let store = SessionStore::new();
        let id = id_of(&store.create());
        // Past IDLE since creation, but not since the get below.
        let check_at = Instant::now() + IDLE + Duration::from_millis(1);

        std::thread::sleep(Duration::from_millis(5));
        store.get(&id).unwrap();

        assert_eq!(store.evict_idle_at(check_at, IDLE), 0);
        assert!(store.get(&id).is_some());
    }
}
