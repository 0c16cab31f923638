//! Server-held sessions keyed by user id.
//!
//! Sessions idle longer than the configured timeout are dropped, and once the pool is full the
//! least recently used one makes room for a new session.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::Session;

struct Entry {
    session: Session,
    last_used: Instant,
}

pub struct SessionPool {
    entries: HashMap<String, Entry>,
    idle_timeout: Duration,
    capacity: usize,
}

impl SessionPool {
    pub fn new(idle_timeout: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            idle_timeout,
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.entries.contains_key(user_id)
    }

    /// The session of `user_id`, marked as used now.
    pub fn get_mut(&mut self, user_id: &str) -> Option<&mut Session> {
        self.get_mut_at(user_id, Instant::now())
    }

    fn get_mut_at(&mut self, user_id: &str, now: Instant) -> Option<&mut Session> {
        let entry = self.entries.get_mut(user_id)?;
        entry.last_used = now;
        Some(&mut entry.session)
    }

    /// Add `session` for `user_id`, evicting idle and, if still full, least recently used entries.
    pub fn insert(&mut self, user_id: &str, session: Session) -> &mut Session {
        self.insert_at(user_id, session, Instant::now())
    }

    fn insert_at(&mut self, user_id: &str, session: Session, now: Instant) -> &mut Session {
        self.entries.remove(user_id);
        self.evict(now);

        let entry = self.entries.entry(user_id.to_string()).or_insert(Entry {
            session,
            last_used: now,
        });
        &mut entry.session
    }

    fn evict(&mut self, now: Instant) {
        let idle_timeout = self.idle_timeout;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_used) < idle_timeout);

        while self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(user_id, _)| user_id.clone());
            match oldest {
                Some(user_id) => {
                    self.entries.remove(&user_id);
                }
                None => break,
            }
        }

        let evicted = before - self.entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, open = self.entries.len(), "Evicted sessions");
        }
    }

    pub fn remove(&mut self, user_id: &str) -> Option<Session> {
        self.entries.remove(user_id).map(|entry| entry.session)
    }

    /// Every open session, without touching their last use.
    pub fn sessions_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.entries.values_mut().map(|entry| &mut entry.session)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::UserDatabase;

    fn session() -> Session {
        Session::new(Arc::new(UserDatabase::in_memory()))
    }

    #[test]
    fn test_idle_sessions_are_dropped_on_insert() {
        let mut pool = SessionPool::new(Duration::from_secs(60), 10);
        let start = Instant::now();
        pool.insert_at("a", session(), start);
        pool.insert_at("b", session(), start + Duration::from_secs(30));

        pool.insert_at("c", session(), start + Duration::from_secs(61));

        assert!(!pool.contains("a"));
        assert!(pool.contains("b"));
        assert!(pool.contains("c"));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_full_pool_evicts_least_recently_used() {
        let mut pool = SessionPool::new(Duration::from_secs(3600), 2);
        let start = Instant::now();
        pool.insert_at("a", session(), start);
        pool.insert_at("b", session(), start + Duration::from_secs(1));
        // Touching "a" makes "b" the oldest
        assert!(pool.get_mut_at("a", start + Duration::from_secs(2)).is_some());

        pool.insert_at("c", session(), start + Duration::from_secs(3));

        assert!(pool.contains("a"));
        assert!(!pool.contains("b"));
        assert!(pool.contains("c"));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_reinsert_replaces_without_evicting_others() {
        let mut pool = SessionPool::new(Duration::from_secs(3600), 2);
        pool.insert("a", session());
        pool.insert("b", session());
        pool.insert("b", session());

        assert_eq!(pool.len(), 2);
        assert!(pool.remove("a").is_some());
        assert!(pool.remove("a").is_none());
        assert_eq!(pool.sessions_mut().count(), 1);
    }
}
