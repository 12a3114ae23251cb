use crate::error::RateLimitError;
use crate::header_parser::{self, HeaderPair};
use crate::key_codec::{self, KeyFields, KeyKind};
use crate::limit_entry::{LimitEntry, LimitEntryFields, LimitType, Source};
use crate::routing::RoutingValue;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use std::time::Instant;

const POLICY_SCOPES: [LimitType; 2] = [LimitType::Application, LimitType::Method];

fn windows_key(routing: RoutingValue, endpoint: &str, limit_type: LimitType) -> Result<String, RateLimitError> {
    let fields = KeyFields::new(routing, Some(endpoint.to_string()), limit_type);
    key_codec::encode(KeyKind::PolicyWindows, &fields, None)
}

fn limit_key(
    routing: RoutingValue,
    endpoint: &str,
    limit_type: LimitType,
    window_sec: u64,
) -> Result<String, RateLimitError> {
    let fields = KeyFields::new(routing, Some(endpoint.to_string()), limit_type);
    key_codec::encode(KeyKind::PolicyLimit, &fields, Some(window_sec))
}

fn authoritative_key(
    routing: RoutingValue,
    endpoint: &str,
    limit_type: LimitType,
    window_sec: u64,
) -> Result<String, RateLimitError> {
    let fields = KeyFields::new(routing, Some(endpoint.to_string()), limit_type);
    key_codec::encode(KeyKind::AuthoritativeCounter, &fields, Some(window_sec))
}

/// True iff the store holds policy-windows keys for **both** `application`
/// and `method` at `(routing, endpoint)`, checked with a single `EXISTS`
/// call over both keys.
pub async fn known(pool: &Pool, routing: RoutingValue, endpoint: &str) -> Result<bool, RateLimitError> {
    let keys: Vec<String> = POLICY_SCOPES
        .iter()
        .map(|lt| windows_key(routing, endpoint, *lt))
        .collect::<Result<_, _>>()?;

    let start = Instant::now();
    let mut conn = pool.get().await?;
    let existing: u64 = conn.exists(&keys).await.map_err(RateLimitError::from)?;
    crate::metrics::record_store_round_trip("policy_known", start.elapsed());
    Ok(existing as usize == keys.len())
}

/// Fetch the policy for `(routing, endpoint)` as one entry per
/// `(limit_type, window_sec)`. Fails with `PolicyNotFound` if either the
/// windows layer or any per-window limit layer is absent — callers are
/// expected to have already gated this behind `known`.
pub async fn fetch(
    pool: &Pool,
    routing: RoutingValue,
    endpoint: &str,
) -> Result<Vec<LimitEntry>, RateLimitError> {
    let start = Instant::now();
    let mut conn = pool.get().await?;
    let mut entries = Vec::new();

    for limit_type in POLICY_SCOPES {
        let wkey = windows_key(routing, endpoint, limit_type)?;
        let windows_csv: Option<String> = conn.get(&wkey).await.map_err(RateLimitError::from)?;
        let windows_csv = windows_csv.ok_or_else(|| RateLimitError::PolicyNotFound {
            routing: routing.to_string(),
            endpoint: endpoint.to_string(),
            limit_type: limit_type.to_string(),
        })?;

        for window_str in windows_csv.split(',').filter(|s| !s.is_empty()) {
            let window_sec: u64 = window_str.parse().map_err(|_| {
                RateLimitError::StoreUnavailable(format!(
                    "corrupt policy-windows value: {windows_csv}"
                ))
            })?;
            let lkey = limit_key(routing, endpoint, limit_type, window_sec)?;
            let count_limit: Option<u64> = conn.get(&lkey).await.map_err(RateLimitError::from)?;
            let count_limit = count_limit.ok_or_else(|| RateLimitError::PolicyNotFound {
                routing: routing.to_string(),
                endpoint: endpoint.to_string(),
                limit_type: limit_type.to_string(),
            })?;

            entries.push(LimitEntry::new(
                routing,
                limit_type,
                Source::Policy,
                LimitEntryFields {
                    endpoint: Some(endpoint.to_string()),
                    window_sec: Some(window_sec),
                    count_limit: Some(count_limit),
                    ..Default::default()
                },
            )?);
        }
    }

    crate::metrics::record_store_round_trip("policy_fetch", start.elapsed());
    Ok(entries)
}

/// Parse `headers` and write the policy-windows and policy-limit keys for
/// every limit_type observed, plus an authoritative-counter mirror of the
/// reported count per window, all in one pipelined, atomic write — callers
/// never observe a partially-written policy.
pub async fn set(
    pool: &Pool,
    headers: &[HeaderPair],
    routing: RoutingValue,
    endpoint: &str,
) -> Result<(), RateLimitError> {
    let entries = header_parser::parse(headers, routing, Some(endpoint))?;
    if entries.is_empty() {
        return Ok(());
    }

    let mut windows_by_scope: std::collections::BTreeMap<LimitType, Vec<u64>> =
        std::collections::BTreeMap::new();
    for entry in &entries {
        let window_sec = entry.window_sec.expect("headers source entries from parse() always set window_sec");
        windows_by_scope.entry(entry.limit_type).or_default().push(window_sec);
    }

    let mut pipe = redis::pipe();
    pipe.atomic();

    for (limit_type, windows) in &windows_by_scope {
        let wkey = windows_key(routing, endpoint, *limit_type)?;
        let csv = windows
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
            .join(",");
        pipe.cmd("SET").arg(&wkey).arg(csv).ignore();
    }

    for entry in &entries {
        let window_sec = entry.window_sec.expect("validated above");
        let count_limit = entry
            .count_limit
            .expect("headers source entries from parse() always set count_limit");
        let lkey = limit_key(routing, endpoint, entry.limit_type, window_sec)?;
        pipe.cmd("SET").arg(&lkey).arg(count_limit).ignore();

        let akey = authoritative_key(routing, endpoint, entry.limit_type, window_sec)?;
        pipe.cmd("SET")
            .arg(&akey)
            .arg(entry.count)
            .arg("EX")
            .arg(window_sec)
            .ignore();
    }

    let start = Instant::now();
    let mut conn = pool.get().await?;
    pipe.query_async::<()>(&mut conn).await.map_err(RateLimitError::from)?;
    crate::metrics::record_store_round_trip("policy_set", start.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_key_matches_template() {
        let key = windows_key(RoutingValue::Euw1, "/lol/summoner", LimitType::Application).unwrap();
        assert_eq!(key, "riot:v1:policy:euw1:/lol/summoner:application:windows");
    }

    #[test]
    fn limit_key_matches_template() {
        let key = limit_key(RoutingValue::Euw1, "/lol/summoner", LimitType::Method, 10).unwrap();
        assert_eq!(key, "riot:v1:policy:euw1:/lol/summoner:method:window:10:limit");
    }
}
