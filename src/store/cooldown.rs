use crate::admission::Decision;
use crate::error::RateLimitError;
use crate::header_parser::{self, HeaderPair};
use crate::key_codec::{self, KeyFields, KeyKind};
use crate::limit_entry::{LimitEntry, LimitEntryFields, LimitType, Source};
use crate::routing::RoutingValue;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

fn cooldown_key(
    routing: RoutingValue,
    endpoint: Option<&str>,
    limit_type: LimitType,
) -> Result<String, RateLimitError> {
    let fields = KeyFields::new(routing, endpoint.map(String::from), limit_type);
    key_codec::encode(KeyKind::Cooldown, &fields, None)
}

fn secs_since_epoch(t: SystemTime) -> Result<i64, RateLimitError> {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .map_err(|_| RateLimitError::TtlInvalid("request_time predates the unix epoch".into()))
}

/// Install a cooldown from a response's back-off headers, unless the
/// response doesn't carry a back-off at all or the clock-skew-adjusted TTL
/// is nonsensical. A rejected TTL is logged and swallowed; the call still
/// returns `Ok(())`.
pub async fn maybe_set(
    pool: &Pool,
    headers: &[HeaderPair],
    routing: RoutingValue,
    endpoint: &str,
    now: SystemTime,
    max_ttl: u64,
) -> Result<(), RateLimitError> {
    let has_retry_after = header_parser::header_value(headers, "retry-after").is_some();
    let has_type = header_parser::header_value(headers, "x-rate-limit-type").is_some();
    let has_date = header_parser::header_value(headers, "date").is_some();
    if !(has_retry_after && has_type && has_date) {
        return Ok(());
    }

    let entry = header_parser::extract_cooldown(headers, routing, Some(endpoint), now, max_ttl);
    let request_time = entry.request_time.expect("extract_cooldown always sets request_time");
    let retry_after = entry.retry_after.expect("extract_cooldown always sets retry_after") as i64;

    let now_secs = secs_since_epoch(now)?;
    let request_secs = secs_since_epoch(request_time)?;
    let adjusted_ttl = (request_secs + retry_after) - now_secs;

    if adjusted_ttl <= 0 || adjusted_ttl as u64 > max_ttl {
        let err = RateLimitError::TtlInvalid(format!(
            "adjusted_ttl={adjusted_ttl} is outside (0, {max_ttl}]"
        ));
        tracing::warn!(error = %err, "not writing cooldown key");
        return Ok(());
    }
    let adjusted_ttl = adjusted_ttl as u64;

    let key = cooldown_key(routing, entry.endpoint.as_deref(), entry.limit_type)?;
    let start = Instant::now();
    let mut conn = pool.get().await?;
    let _: () = conn
        .set_ex(&key, adjusted_ttl, adjusted_ttl)
        .await
        .map_err(RateLimitError::from)?;
    crate::metrics::record_store_round_trip("cooldown_maybe_set", start.elapsed());

    tracing::debug!(%key, adjusted_ttl, "installed cooldown");
    metrics::counter!(
        "rate_limit_cooldowns_installed_total",
        "routing" => routing.to_string(),
        "limit_type" => entry.limit_type.to_string(),
    )
    .increment(1);
    Ok(())
}

/// Check whether any of the three cooldown variants for `(routing,
/// endpoint)` is currently active, returning the one with the largest
/// positive TTL. A cooldown is purely reactive — there is no counter
/// representation for it, only a TTL'd marker key.
pub async fn status(
    pool: &Pool,
    routing: RoutingValue,
    endpoint: &str,
) -> Result<Decision, RateLimitError> {
    let app_key = cooldown_key(routing, None, LimitType::Application)?;
    let service_key = cooldown_key(routing, None, LimitType::Service)?;
    let method_key = cooldown_key(routing, Some(endpoint), LimitType::Method)?;

    let start = Instant::now();
    let mut conn = pool.get().await?;
    let ttls: (i64, i64, i64) = redis::pipe()
        .ttl(&app_key)
        .ttl(&service_key)
        .ttl(&method_key)
        .query_async(&mut conn)
        .await
        .map_err(RateLimitError::from)?;
    crate::metrics::record_store_round_trip("cooldown_status", start.elapsed());

    let candidates = [
        (LimitType::Application, None::<&str>, ttls.0),
        (LimitType::Service, None::<&str>, ttls.1),
        (LimitType::Method, Some(endpoint), ttls.2),
    ];

    let best = candidates
        .into_iter()
        .filter(|(_, _, ttl)| *ttl > 0)
        .max_by_key(|(_, _, ttl)| *ttl);

    match best {
        Some((limit_type, endpoint, ttl)) => {
            let entry = LimitEntry::new(
                routing,
                limit_type,
                Source::Cooldown,
                LimitEntryFields {
                    endpoint: endpoint.map(String::from),
                    ttl: Some(ttl as u64),
                    ..Default::default()
                },
            )?;
            Ok(Decision::Throttle(vec![entry]))
        }
        None => {
            let entry = LimitEntry::new(
                routing,
                LimitType::Service,
                Source::Cooldown,
                LimitEntryFields::default(),
            )?;
            Ok(Decision::Allow(vec![entry]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_key_omits_endpoint_for_application() {
        let key = cooldown_key(RoutingValue::Euw1, None, LimitType::Application).unwrap();
        assert_eq!(key, "lol_api:v1:cooldown:euw1:application");
    }

    #[test]
    fn cooldown_key_includes_endpoint_for_method() {
        let key = cooldown_key(RoutingValue::Euw1, Some("/lol/summoner"), LimitType::Method).unwrap();
        assert_eq!(key, "lol_api:v1:cooldown:euw1:/lol/summoner:method");
    }
}
