use std::collections::HashMap;
use std::time::{Duration, Instant};

use quizhost_core::GamePin;
use tokio::sync::RwLock;

/// External PIN -> game id index with a TTL, standing in for the gateway's
/// indexed map (§6.3). A Coordinator generates its own PIN at construction
/// and is agnostic to whether it's globally unique (§9 "PIN generation");
/// this registry is where a caller creating a new game checks for
/// collisions and retries by creating a fresh coordinator with a new PIN.
pub struct PinRegistry {
    entries: RwLock<HashMap<GamePin, Entry>>,
    ttl: Duration,
}

struct Entry {
    game_id: String,
    expires_at: Instant,
}

impl PinRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Register `pin -> game_id` if the PIN isn't already live. Returns
    /// `false` on collision, in which case the caller is expected to
    /// discard the coordinator that generated this PIN and try again with
    /// a freshly generated one.
    pub async fn try_register(&self, pin: GamePin, game_id: &str) -> bool {
        let mut entries = self.entries.write().await;
        Self::evict_expired(&mut entries);
        if entries.contains_key(&pin) {
            return false;
        }
        entries.insert(
            pin,
            Entry {
                game_id: game_id.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        true
    }

    /// Resolve a PIN to its game id, if the entry exists and hasn't expired.
    pub async fn resolve(&self, pin: GamePin) -> Option<String> {
        let entries = self.entries.read().await;
        let entry = entries.get(&pin)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.game_id.clone())
    }

    fn evict_expired(entries: &mut HashMap<GamePin, Entry>) {
        let now = Instant::now();
        entries.retain(|_, e| e.expires_at > now);
    }
}
