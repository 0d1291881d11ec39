use serde::Deserialize;

/// Top-level server configuration, loaded from `quizhost.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub persistence: PersistenceConfig,
    pub limits: LimitsConfig,
    pub pin: PinConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            persistence: PersistenceConfig::default(),
            limits: LimitsConfig::default(),
            pin: PinConfig::default(),
        }
    }
}

/// Where durable game snapshots live on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub snapshot_dir: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: "data/games".to_string(),
        }
    }
}

/// Infrastructure limits (connection caps, roster size, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_players_per_game: usize,
    pub player_message_buffer: usize,
    /// API endpoint rate limit: max burst tokens per IP.
    pub api_rate_limit_burst: usize,
    /// API endpoint rate limit: token refill rate (requests per second) per IP.
    pub api_rate_limit_per_sec: f64,
    /// Maximum concurrent WebSocket connections per IP address.
    pub max_ws_per_ip: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_players_per_game: quizhost_core::player::MAX_PLAYERS,
            player_message_buffer: 256,
            api_rate_limit_burst: 20,
            api_rate_limit_per_sec: 2.0, // ~120 req/min
            max_ws_per_ip: 10,
        }
    }
}

/// PIN-registry lifetime. The registry itself lives outside this crate
/// (§6.3); this only governs how long a freshly-generated PIN is expected
/// to remain reserved before the caller lets it expire.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub ttl_hours: u64,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self { ttl_hours: 24 }
    }
}

impl ServerConfig {
    /// Validate configuration, logging errors and exiting on anything that
    /// would make the server unable to start correctly. Clamps
    /// `limits.max_players_per_game` down to the protocol's hard cap rather
    /// than letting a misconfigured deployment exceed it at runtime.
    pub fn validate(&mut self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }
        if self.persistence.snapshot_dir.trim().is_empty() {
            tracing::error!("persistence.snapshot_dir must not be empty");
            std::process::exit(1);
        }
        if self.limits.max_players_per_game == 0 {
            tracing::error!("limits.max_players_per_game must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_players_per_game > quizhost_core::player::MAX_PLAYERS {
            tracing::warn!(
                configured = self.limits.max_players_per_game,
                hard_cap = quizhost_core::player::MAX_PLAYERS,
                "limits.max_players_per_game exceeds the protocol's hard cap, clamping to it"
            );
            self.limits.max_players_per_game = quizhost_core::player::MAX_PLAYERS;
        }
        if self.limits.player_message_buffer == 0 {
            tracing::error!("limits.player_message_buffer must be > 0");
            std::process::exit(1);
        }
        if self.limits.api_rate_limit_per_sec <= 0.0 {
            tracing::error!("limits.api_rate_limit_per_sec must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_ws_per_ip == 0 {
            tracing::error!("limits.max_ws_per_ip must be > 0");
            std::process::exit(1);
        }
        if self.pin.ttl_hours == 0 {
            tracing::error!("pin.ttl_hours must be > 0");
            std::process::exit(1);
        }
    }

    /// Load config from `quizhost.toml` if it exists, then apply env var
    /// overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("quizhost.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from quizhost.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse quizhost.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No quizhost.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("QUIZHOST_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(dir) = std::env::var("QUIZHOST_SNAPSHOT_DIR")
            && !dir.is_empty()
        {
            config.persistence.snapshot_dir = dir;
        }
        if let Ok(val) = std::env::var("QUIZHOST_MAX_PLAYERS_PER_GAME")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_players_per_game = n;
        }
        if let Ok(val) = std::env::var("QUIZHOST_MAX_WS_PER_IP")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_per_ip = n;
        }
        if let Ok(val) = std::env::var("QUIZHOST_PIN_TTL_HOURS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.pin.ttl_hours = n;
        }

        config
    }
}
