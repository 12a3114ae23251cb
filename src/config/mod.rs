pub mod types;

#[cfg(test)]
mod tests;

pub use types::Config;

use crate::error::RateLimitError;
use std::path::Path;

impl Config {
    /// Load configuration from a file (if it exists) and apply environment
    /// variable overrides. When the file does not exist, built-in defaults
    /// are used — allowing callers to start against a local Redis with zero
    /// configuration.
    pub fn load(path: &Path) -> Result<Self, RateLimitError> {
        let mut config: Config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| RateLimitError::Config(e.to_string()))?;
            match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => toml::from_str(&content)
                    .map_err(|e| RateLimitError::Config(e.to_string()))?,
                Some("json") => serde_json::from_str(&content)
                    .map_err(|e| RateLimitError::Config(e.to_string()))?,
                Some(ext) => {
                    return Err(RateLimitError::Config(format!(
                        "unsupported config format: .{ext}, use .toml or .json"
                    )))
                }
                None => {
                    return Err(RateLimitError::Config(
                        "config file has no extension, use .toml or .json".into(),
                    ))
                }
            }
        } else {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!("loaded rate limiter configuration");
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RIOT_RATELIMIT_REDIS_URL") {
            self.redis_url = v;
        }
        if let Ok(v) = std::env::var("RIOT_RATELIMIT_POOL_NAME") {
            self.pool_name = v;
        }
        if let Ok(v) = std::env::var("RIOT_RATELIMIT_POOL_SIZE") {
            if let Ok(n) = v.parse() {
                self.pool_size = n;
            }
        }
        if let Ok(v) = std::env::var("RIOT_RATELIMIT_MAX_OVERFLOW") {
            if let Ok(n) = v.parse() {
                self.max_overflow = n;
            }
        }
        if let Ok(v) = std::env::var("RIOT_RATELIMIT_MAX_COOLDOWN_TTL") {
            if let Ok(n) = v.parse() {
                self.max_cooldown_ttl = n;
            }
        }
        if let Ok(v) = std::env::var("RIOT_RATELIMIT_POOL_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.pool_timeout_secs = n;
            }
        }
    }

    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.redis_url.is_empty() {
            return Err(RateLimitError::Config("redis_url cannot be empty".into()));
        }
        if self.pool_size == 0 {
            return Err(RateLimitError::Config("pool_size must be positive".into()));
        }
        if self.max_cooldown_ttl == 0 {
            return Err(RateLimitError::Config(
                "max_cooldown_ttl must be positive".into(),
            ));
        }
        Ok(())
    }
}
