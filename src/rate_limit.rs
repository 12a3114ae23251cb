use crate::admission::{self, Decision};
use crate::config::Config;
use crate::error::RateLimitError;
use crate::header_parser::{self, HeaderPair};
use crate::limit_entry::{LimitEntry, LimitEntryFields, LimitType, Source};
use crate::routing::RoutingValue;
use crate::store::{cooldown, policy, pool};
use deadpool_redis::Pool;
use std::time::SystemTime;

/// The public façade: composes cooldown checks, policy lookups, and the
/// atomic counter check into the two operations call sites actually use.
pub struct RateLimit {
    pool: Pool,
    max_cooldown_ttl: u64,
}

impl RateLimit {
    pub fn new(config: &Config) -> Result<Self, RateLimitError> {
        Ok(Self {
            pool: pool::connect(config)?,
            max_cooldown_ttl: config.max_cooldown_ttl,
        })
    }

    pub fn from_pool(pool: Pool, max_cooldown_ttl: u64) -> Self {
        Self { pool, max_cooldown_ttl }
    }

    /// Decide whether to admit a call to `(routing, endpoint)`.
    ///
    /// Ordered chain: cooldown first (a reactive back-off always wins),
    /// then a blind-request allowance if no policy has been bootstrapped
    /// yet, then the atomic counter check.
    pub async fn hit(&self, routing: RoutingValue, endpoint: &str) -> Result<Decision, RateLimitError> {
        if let Decision::Throttle(entries) = cooldown::status(&self.pool, routing, endpoint).await? {
            metrics::counter!(
                "rate_limit_throttles_total",
                "routing" => routing.to_string(),
                "source" => "cooldown",
            )
            .increment(1);
            return Ok(Decision::Throttle(entries));
        }

        if !policy::known(&self.pool, routing, endpoint).await? {
            // A blind request has no policy yet to describe; `Source::Headers`
            // is the only provenance with no required fields, so it stands in
            // for "observation, not yet a policy" here.
            let blind = LimitEntry::new(
                routing,
                LimitType::Application,
                Source::Headers,
                LimitEntryFields::default(),
            )?;
            metrics::counter!(
                "rate_limit_blind_requests_total",
                "routing" => routing.to_string(),
            )
            .increment(1);
            return Ok(Decision::Allow(vec![blind]));
        }

        let entries = policy::fetch(&self.pool, routing, endpoint).await?;
        let decision = admission::enforce_and_maybe_increment(&self.pool, &entries).await?;
        match &decision {
            Decision::Allow(_) => {
                metrics::counter!(
                    "rate_limit_hits_total",
                    "routing" => routing.to_string(),
                    "outcome" => "allow",
                )
                .increment(1);
            }
            Decision::Throttle(_) => {
                metrics::counter!(
                    "rate_limit_throttles_total",
                    "routing" => routing.to_string(),
                    "source" => "live",
                )
                .increment(1);
            }
        }
        Ok(decision)
    }

    /// Record the outcome of a completed upstream call.
    ///
    /// Cooldown is written before policy so a 429 always installs its
    /// back-off even when the policy record turns out to be incomplete.
    pub async fn refresh(
        &self,
        headers: &[HeaderPair],
        routing: RoutingValue,
        endpoint: &str,
        now: SystemTime,
    ) -> Result<Vec<LimitEntry>, RateLimitError> {
        cooldown::maybe_set(&self.pool, headers, routing, endpoint, now, self.max_cooldown_ttl).await?;

        if !policy::known(&self.pool, routing, endpoint).await? {
            policy::set(&self.pool, headers, routing, endpoint).await?;
            metrics::counter!(
                "rate_limit_policy_bootstraps_total",
                "routing" => routing.to_string(),
                "endpoint" => endpoint.to_string(),
            )
            .increment(1);
        }

        header_parser::parse(headers, routing, Some(endpoint))
    }
}
