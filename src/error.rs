use std::fmt;

/// Crate-wide error taxonomy. Variants are semantic kinds, not a wrapper
/// around whatever library raised them — callers match on kind, not on
/// message text.
#[derive(Debug)]
pub enum RateLimitError {
    /// A response header violated the expected grammar. Always surfaced
    /// to the caller; never retried internally.
    HeaderMalformed(String),
    /// `PolicyStore::fetch` was called before `PolicyStore::known?` gated it.
    /// Not reachable via `RateLimit::hit`; only via direct `PolicyStore` use.
    PolicyNotFound { routing: String, endpoint: String, limit_type: String },
    /// A cooldown TTL was non-positive or exceeded `max_cooldown_ttl`.
    /// Constructed for logging; `CooldownStore::maybe_set` swallows it and
    /// never lets it reach a caller.
    TtlInvalid(String),
    /// The shared store returned a transport or protocol error.
    StoreUnavailable(String),
    /// A `LimitEntry` invariant was violated. Always a
    /// programming or protocol bug; never caught at the call site that
    /// triggers it — it is expected to propagate to the top of the stack.
    InvariantViolated(String),
    /// Configuration failed to load or validate.
    Config(String),
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::HeaderMalformed(msg) => write!(f, "malformed rate-limit header: {msg}"),
            RateLimitError::PolicyNotFound { routing, endpoint, limit_type } => write!(
                f,
                "policy not found for routing={routing} endpoint={endpoint} limit_type={limit_type}"
            ),
            RateLimitError::TtlInvalid(msg) => write!(f, "invalid cooldown ttl: {msg}"),
            RateLimitError::StoreUnavailable(msg) => write!(f, "store unavailable: {msg}"),
            RateLimitError::InvariantViolated(msg) => write!(f, "limit entry invariant violated: {msg}"),
            RateLimitError::Config(msg) => write!(f, "configuration error: {msg}"),
        }
    }
}

impl std::error::Error for RateLimitError {}

impl From<redis::RedisError> for RateLimitError {
    fn from(err: redis::RedisError) -> Self {
        RateLimitError::StoreUnavailable(err.to_string())
    }
}

impl From<deadpool_redis::PoolError> for RateLimitError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        RateLimitError::StoreUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RateLimitError>;
