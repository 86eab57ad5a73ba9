//! Live sessions, indexed by slot and by logged-in user id.

use std::sync::Arc;

use dashmap::DashMap;

use crate::session::Session;
use crate::slots::SlotId;

/// Concurrent directory of active sessions.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SlotId, Arc<Session>>,
    user_index: DashMap<u32, SlotId>,
}

impl SessionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its slot.
    pub fn insert(&self, session: Arc<Session>) {
        self.sessions.insert(session.slot(), session);
    }

    /// Unregister the session in `slot`, dropping its user index entry.
    pub fn remove(&self, slot: SlotId) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(&slot)?;
        if let Some(user_id) = session.user_id() {
            self.user_index.remove_if(&user_id, |_, indexed| *indexed == slot);
        }
        Some(session)
    }

    /// Session in `slot`.
    pub fn get(&self, slot: SlotId) -> Option<Arc<Session>> {
        self.sessions.get(&slot).map(|entry| Arc::clone(entry.value()))
    }

    /// Session of the logged-in `user_id`.
    pub fn by_user(&self, user_id: u32) -> Option<Arc<Session>> {
        let slot = *self.user_index.get(&user_id)?;
        self.get(slot)
    }

    /// Log `user_id` in on the session in `slot` and index it. A newer login
    /// for the same user replaces the index entry.
    pub fn bind_user(&self, slot: SlotId, user_id: u32, rank: u8) -> bool {
        let Some(session) = self.get(slot) else {
            return false;
        };
        session.login(user_id, rank);
        self.user_index.insert(user_id, slot);
        tracing::debug!(%slot, user_id, rank, "user bound to session");
        true
    }

    /// Logged-in sessions whose rank is at least `min_rank`.
    pub fn with_min_rank(&self, min_rank: u8) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .filter(|entry| entry.is_logged_in() && entry.rank() >= min_rank)
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// All registered sessions.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(registry: &SessionRegistry, slot: u32) -> Arc<Session> {
        let (session, _rx) = Session::new(SlotId::new(slot).unwrap(), "10.0.0.1:5000".parse().unwrap());
        let session = Arc::new(session);
        registry.insert(Arc::clone(&session));
        session
    }

    #[test]
    fn test_lookup_by_slot_and_user() {
        let registry = SessionRegistry::new();
        let s1 = add(&registry, 1);
        add(&registry, 2);

        assert!(registry.by_user(7).is_none());
        assert!(registry.bind_user(s1.slot(), 7, 1));
        assert_eq!(registry.by_user(7).unwrap().slot(), s1.slot());
        assert_eq!(registry.get(SlotId::new(2).unwrap()).unwrap().slot().get(), 2);
        assert!(!registry.bind_user(SlotId::new(9).unwrap(), 8, 1));
    }

    #[test]
    fn test_remove_clears_user_index() {
        let registry = SessionRegistry::new();
        let s1 = add(&registry, 1);
        registry.bind_user(s1.slot(), 7, 1);

        assert!(registry.remove(s1.slot()).is_some());
        assert!(registry.by_user(7).is_none());
        assert!(registry.remove(s1.slot()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_relogin_keeps_newest_index() {
        let registry = SessionRegistry::new();
        let old = add(&registry, 1);
        let new = add(&registry, 2);
        registry.bind_user(old.slot(), 7, 1);
        registry.bind_user(new.slot(), 7, 1);

        registry.remove(old.slot());
        assert_eq!(registry.by_user(7).unwrap().slot(), new.slot());
    }

    #[test]
    fn test_rank_filter_skips_anonymous() {
        let registry = SessionRegistry::new();
        let low = add(&registry, 1);
        let high = add(&registry, 2);
        add(&registry, 3);
        registry.bind_user(low.slot(), 10, 1);
        registry.bind_user(high.slot(), 11, 5);

        let staff = registry.with_min_rank(4);
        assert_eq!(staff.len(), 1);
        assert_eq!(staff[0].user_id(), Some(11));
        assert_eq!(registry.with_min_rank(0).len(), 2);
        assert_eq!(registry.len(), 3);
    }
}
