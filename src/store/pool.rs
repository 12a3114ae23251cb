use crate::config::Config;
use crate::error::RateLimitError;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};

/// Connect a pool from the crate's `Config`. `pool_size` and `max_overflow`
/// are folded into a single `max_size` since `deadpool` has no separate
/// overflow tier.
pub fn connect(config: &Config) -> Result<Pool, RateLimitError> {
    let mut pool_cfg = PoolConfig::from_url(&config.redis_url);
    let mut runtime_cfg = deadpool_redis::PoolConfig::new(
        (config.pool_size + config.max_overflow).max(1) as usize,
    );
    runtime_cfg.timeouts.wait = Some(std::time::Duration::from_secs(config.pool_timeout_secs));
    pool_cfg.pool = Some(runtime_cfg);

    pool_cfg
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| RateLimitError::Config(format!("failed to build redis pool: {e}")))
}
