use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::coordinator::{Coordinator, CoordinatorHandle};
use crate::persistence::SnapshotStore;
use crate::pin_registry::PinRegistry;
use crate::rate_limit::IpRateLimiter;

/// Registry of live coordinators, keyed by game id. Each entry is spawned
/// at most once; after that, every caller talks to the same actor mailbox.
#[derive(Default)]
pub struct CoordinatorRegistry {
    coordinators: RwLock<HashMap<String, CoordinatorHandle>>,
}

impl CoordinatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, game_id: &str) -> Option<CoordinatorHandle> {
        self.coordinators.read().await.get(game_id).cloned()
    }

    async fn insert(&self, game_id: String, handle: CoordinatorHandle) {
        self.coordinators.write().await.insert(game_id, handle);
    }

    /// Create a brand new game: generate ids until a PIN registers without
    /// collision (§6.3 "On collision at creation, the caller retries"),
    /// then publish the coordinator in the registry.
    pub async fn create_game(
        &self,
        store: SnapshotStore,
        pin_registry: &PinRegistry,
        max_players: usize,
    ) -> (String, CoordinatorHandle) {
        loop {
            let game_id = Uuid::new_v4().to_string();
            let handle = Coordinator::spawn(game_id.clone(), store.clone(), max_players).await;
            let Some(snapshot) = handle.inspect().await else { continue };
            if pin_registry.try_register(snapshot.game_pin, &game_id).await {
                self.insert(game_id.clone(), handle.clone()).await;
                return (game_id, handle);
            }
            // PIN collided; this coordinator's state was never observed by
            // any client, so it's safe to simply let it be dropped.
        }
    }

    /// Fetch a coordinator for an existing game id, spawning (and loading
    /// its persisted snapshot) on first access.
    pub async fn get_or_spawn(&self, game_id: &str, store: SnapshotStore, max_players: usize) -> CoordinatorHandle {
        if let Some(handle) = self.get(game_id).await {
            return handle;
        }
        let mut coordinators = self.coordinators.write().await;
        if let Some(handle) = coordinators.get(game_id) {
            return handle.clone();
        }
        let handle = Coordinator::spawn(game_id.to_string(), store, max_players).await;
        coordinators.insert(game_id.to_string(), handle.clone());
        handle
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: SnapshotStore,
    pub coordinators: Arc<CoordinatorRegistry>,
    pub pin_registry: Arc<PinRegistry>,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub api_rate_limiter: Arc<IpRateLimiter>,
    pub ws_per_ip: Arc<std::sync::Mutex<HashMap<IpAddr, usize>>>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let store = SnapshotStore::new(config.persistence.snapshot_dir.clone());
        let pin_registry = PinRegistry::new(std::time::Duration::from_secs(config.pin.ttl_hours * 3600));
        let api_rate_limiter = IpRateLimiter::new(
            config.limits.api_rate_limit_burst as f64,
            config.limits.api_rate_limit_per_sec,
        );
        Self {
            config: Arc::new(config),
            store,
            coordinators: Arc::new(CoordinatorRegistry::new()),
            pin_registry: Arc::new(pin_registry),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            api_rate_limiter: Arc::new(api_rate_limiter),
            ws_per_ip: Arc::new(std::sync::Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        }
    }
}

/// RAII guard that decrements a counter on drop.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}

/// RAII guard that tracks per-IP WebSocket connection count. Uses a
/// synchronous `std::sync::Mutex` so the counter can be decremented in
/// `Drop` without spawning a task that might not run during shutdown.
pub struct IpConnectionGuard {
    ip: IpAddr,
    ws_per_ip: Arc<std::sync::Mutex<HashMap<IpAddr, usize>>>,
}

impl IpConnectionGuard {
    pub fn try_acquire(
        ip: IpAddr,
        ws_per_ip: Arc<std::sync::Mutex<HashMap<IpAddr, usize>>>,
        max_per_ip: usize,
    ) -> Option<Self> {
        let mut map = ws_per_ip.lock().ok()?;
        let count = map.entry(ip).or_insert(0);
        if *count >= max_per_ip {
            return None;
        }
        *count += 1;
        drop(map);
        Some(Self { ip, ws_per_ip })
    }
}

impl Drop for IpConnectionGuard {
    fn drop(&mut self) {
        if let Ok(mut map) = self.ws_per_ip.lock()
            && let Some(count) = map.get_mut(&self.ip)
        {
            *count = count.saturating_sub(1);
            if *count == 0 {
                map.remove(&self.ip);
            }
        }
    }
}
