use serde::{Deserialize, Serialize};

/// The only configuration this crate recognises, plus the
/// connection string a working store pool needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `redis://` URL for the shared store.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Store-pool identifier, surfaced in logs/metrics only.
    #[serde(default = "default_pool_name")]
    pub pool_name: String,

    /// Pool concurrency bound. Combined with `max_overflow` to form the
    /// pool's `max_size` (deadpool has no separate overflow concept).
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    #[serde(default)]
    pub max_overflow: u32,

    /// Upper cap on any cooldown TTL in seconds.
    #[serde(default = "default_max_cooldown_ttl")]
    pub max_cooldown_ttl: u64,

    /// Pool-acquire timeout — the one configurable timeout in the
    /// concurrency model.
    #[serde(default = "default_pool_timeout_secs")]
    pub pool_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            pool_name: default_pool_name(),
            pool_size: default_pool_size(),
            max_overflow: 0,
            max_cooldown_ttl: default_max_cooldown_ttl(),
            pool_timeout_secs: default_pool_timeout_secs(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_pool_name() -> String {
    "riot-ratelimit".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_max_cooldown_ttl() -> u64 {
    3600
}

fn default_pool_timeout_secs() -> u64 {
    5
}
