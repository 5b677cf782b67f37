//! Server-wide directory of active game sessions.
//!
//! The registry is guarded by one lock, acquired before any per-session
//! lock. Session ids are monotonically increasing and never reused, even
//! after a session is destroyed.

use crate::session::GameSession;
use log::info;
use shared::wire;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct SessionRegistry {
    sessions: HashMap<u32, Arc<Mutex<GameSession>>>,
    next_gid: u32,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next_gid: 1,
        }
    }

    /// Creates a session with the given capacity and registers it.
    ///
    /// Returns the allocated gid together with the session handle so the
    /// caller can seat the creator without a second lookup.
    pub fn create_session(&mut self, capacity: u8) -> (u32, Arc<Mutex<GameSession>>) {
        let gid = self.next_gid;
        self.next_gid += 1;

        let session = Arc::new(Mutex::new(GameSession::new(gid, capacity)));
        self.sessions.insert(gid, Arc::clone(&session));
        info!("Created game {} with capacity {}", gid, capacity);

        (gid, session)
    }

    pub fn get_session(&self, gid: u32) -> Option<Arc<Mutex<GameSession>>> {
        self.sessions.get(&gid).cloned()
    }

    /// Drops a session from the directory; idempotent.
    pub fn remove_session(&mut self, gid: u32) -> bool {
        if self.sessions.remove(&gid).is_some() {
            info!("Removed game {}", gid);
            true
        } else {
            false
        }
    }

    /// Encodes the game info list for every registered session.
    ///
    /// Caller holds the registry lock; per-session locks are taken briefly
    /// underneath it, which matches the registry-before-session order.
    pub async fn serialize_summaries(&self) -> Vec<u8> {
        let mut summaries = Vec::with_capacity(self.sessions.len());
        for session in self.sessions.values() {
            summaries.push(session.lock().await.summary().await);
        }
        wire::encode_game_info_list(&summaries)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn gids_are_monotonic_and_never_reused() {
        let mut registry = SessionRegistry::new();

        let (gid1, _) = registry.create_session(2);
        let (gid2, _) = registry.create_session(2);
        assert_eq!(gid1, 1);
        assert_eq!(gid2, 2);

        registry.remove_session(gid1);
        let (gid3, _) = registry.create_session(4);
        assert_eq!(gid3, 3, "destroyed gid must not be recycled");
    }

    #[tokio::test]
    async fn lookup_and_idempotent_removal() {
        let mut registry = SessionRegistry::new();
        let (gid, _) = registry.create_session(2);

        assert!(registry.get_session(gid).is_some());
        assert!(registry.get_session(gid + 1).is_none());

        assert!(registry.remove_session(gid));
        assert!(!registry.remove_session(gid));
        assert!(registry.get_session(gid).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn summaries_cover_all_sessions() {
        let mut registry = SessionRegistry::new();
        registry.create_session(2);
        registry.create_session(5);

        let bytes = registry.serialize_summaries().await;
        let mut games = wire::decode_game_info_list(&bytes).unwrap();
        games.sort_by_key(|g| g.gid);

        assert_eq!(games.len(), 2);
        assert_eq!(games[0].gid, 1);
        assert_eq!(games[0].max_players, 2);
        assert_eq!(games[1].gid, 2);
        assert_eq!(games[1].max_players, 5);
        assert!(games.iter().all(|g| g.players.is_empty()));
        assert!(games.iter().all(|g| g.start_time == 0));
    }

    #[tokio::test]
    async fn empty_registry_serializes_empty_list() {
        let registry = SessionRegistry::new();
        let bytes = registry.serialize_summaries().await;
        assert!(bytes.is_empty());
    }
}
