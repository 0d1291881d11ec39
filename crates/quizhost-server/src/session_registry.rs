use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use quizhost_core::PlayerId;
use tokio::sync::mpsc;

pub type SessionId = u64;

/// Who a live connection belongs to. The host never has a `PlayerId`
/// (§4.2). A freshly admitted player socket starts as `Player(None)`: it
/// only becomes identified once `player_join`/`player_rejoin` succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Host,
    Player(Option<PlayerId>),
}

struct Session {
    role: Role,
    tx: mpsc::UnboundedSender<String>,
}

/// Live in-memory connection bookkeeping for one game (§4.2). Unlike
/// `GameState`, nothing here is persisted: a socket never survives a
/// restart, so the registry is always rebuilt empty on coordinator startup.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly admitted socket and return its session id.
    pub fn register(&mut self, role: Role, tx: mpsc::UnboundedSender<String>) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sessions.insert(id, Session { role, tx });
        id
    }

    /// Remove a session on socket close. Returns the role it held, so the
    /// caller can decide what close-handling logic applies.
    pub fn remove(&mut self, id: SessionId) -> Option<Role> {
        self.sessions.remove(&id).map(|s| s.role)
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Best-effort per-session send. Transport errors are swallowed: the
    /// eventual close event is the authoritative signal that a client is
    /// gone (§4.2).
    pub fn send(&self, id: SessionId, message: &str) {
        if let Some(session) = self.sessions.get(&id) {
            let _ = session.tx.send(message.to_string());
        }
    }

    /// Send to every live session, host and players alike.
    pub fn broadcast(&self, message: &str) {
        for session in self.sessions.values() {
            let _ = session.tx.send(message.to_string());
        }
    }

    /// Send only to the session playing a specific role predicate. Used for
    /// the host/player split view of `question_start` (§4.4).
    pub fn broadcast_filtered(&self, mut message_for: impl FnMut(bool) -> String) {
        for session in self.sessions.values() {
            let is_host = matches!(session.role, Role::Host);
            let _ = session.tx.send(message_for(is_host));
        }
    }

    /// Bind a session that was admitted as an unidentified player to the
    /// player id it established via `player_join`/`player_rejoin`.
    pub fn identify_player(&mut self, id: SessionId, player_id: PlayerId) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.role = Role::Player(Some(player_id));
        }
    }

    pub fn role_of(&self, id: SessionId) -> Option<&Role> {
        self.sessions.get(&id).map(|s| &s.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (mpsc::UnboundedSender<String>, mpsc::UnboundedReceiver<String>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn register_and_remove_round_trips() {
        let mut registry = SessionRegistry::new();
        let (tx, _rx) = channel();
        let id = registry.register(Role::Host, tx);
        assert!(!registry.is_empty());
        let role = registry.remove(id);
        assert_eq!(role, Some(Role::Host));
        assert!(registry.is_empty());
    }

    #[test]
    fn broadcast_reaches_every_session() {
        let mut registry = SessionRegistry::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        registry.register(Role::Host, tx1);
        registry.register(Role::Player(Some("p1".into())), tx2);

        registry.broadcast("hello");

        assert_eq!(rx1.try_recv().unwrap(), "hello");
        assert_eq!(rx2.try_recv().unwrap(), "hello");
    }

    #[test]
    fn send_to_closed_session_does_not_panic() {
        let mut registry = SessionRegistry::new();
        let (tx, rx) = channel();
        let id = registry.register(Role::Host, tx);
        drop(rx);
        registry.send(id, "ignored");
    }

    #[test]
    fn broadcast_filtered_gives_each_session_its_own_view() {
        let mut registry = SessionRegistry::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        registry.register(Role::Host, tx1);
        registry.register(Role::Player(Some("p1".into())), tx2);

        registry.broadcast_filtered(|is_host| if is_host { "host-view".into() } else { "player-view".into() });

        assert_eq!(rx1.try_recv().unwrap(), "host-view");
        assert_eq!(rx2.try_recv().unwrap(), "player-view");
    }

}
