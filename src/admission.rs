use crate::error::RateLimitError;
use crate::key_codec::{self, KeyFields, KeyKind};
use crate::limit_entry::{LimitEntry, LimitEntryFields, Source};
use deadpool_redis::Pool;
use redis::Script;
use std::time::Instant;

/// The outcome of an admission decision, carrying the live entries that
/// justify it.
#[derive(Debug, Clone)]
pub enum Decision {
    Allow(Vec<LimitEntry>),
    Throttle(Vec<LimitEntry>),
}

static CHECK_AND_INCREMENT: &str = include_str!("store/scripts/check_and_increment.lua");

/// The atomic check-and-increment at the heart of the system.
/// `policy_entries` must be `source = Policy` entries with `window_sec` and
/// `count_limit` set — i.e. exactly what `PolicyStore::fetch` returns.
///
/// Every policy entry contributes a `(live_counter_key, policy_limit_key)`
/// pair to a single Lua script invocation, so the probe phase and the
/// commit phase each run as one atomic unit across every window — two
/// concurrent callers can never both observe sub-limit counts and both
/// commit.
pub async fn enforce_and_maybe_increment(
    pool: &Pool,
    policy_entries: &[LimitEntry],
) -> Result<Decision, RateLimitError> {
    if policy_entries.is_empty() {
        return Ok(Decision::Allow(Vec::new()));
    }

    let mut keys = Vec::with_capacity(policy_entries.len() * 2);
    let mut windows = Vec::with_capacity(policy_entries.len());
    for entry in policy_entries {
        let window_sec = entry.window_sec.ok_or_else(|| {
            RateLimitError::InvariantViolated("policy entry missing window_sec".into())
        })?;
        let fields = KeyFields::new(entry.routing_val, entry.endpoint.clone(), entry.limit_type);
        let counter_key = key_codec::encode(KeyKind::LiveCounter, &fields, Some(window_sec))?;
        let limit_key = key_codec::encode(KeyKind::PolicyLimit, &fields, Some(window_sec))?;
        keys.push(counter_key);
        keys.push(limit_key);
        windows.push(window_sec);
    }

    let start = Instant::now();
    let mut conn = pool.get().await?;
    let script = Script::new(CHECK_AND_INCREMENT);
    let mut invocation = script.prepare_invoke();
    for key in &keys {
        invocation.key(key);
    }
    for window in &windows {
        invocation.arg(window);
    }

    let raw: Vec<i64> = invocation
        .invoke_async(&mut conn)
        .await
        .map_err(RateLimitError::from)?;
    crate::metrics::record_store_round_trip("check_and_increment", start.elapsed());

    decode_result(&raw, policy_entries)
}

fn decode_result(raw: &[i64], policy_entries: &[LimitEntry]) -> Result<Decision, RateLimitError> {
    match raw.first() {
        Some(0) => {
            // {0, offending_index(1-based), count, limit, ttl}
            let idx = *raw.get(1).ok_or_else(|| malformed_response(raw))? as usize;
            let count = *raw.get(2).ok_or_else(|| malformed_response(raw))?;
            let limit = *raw.get(3).ok_or_else(|| malformed_response(raw))?;
            let ttl = *raw.get(4).ok_or_else(|| malformed_response(raw))?;
            let policy = policy_entries
                .get(idx.saturating_sub(1))
                .ok_or_else(|| malformed_response(raw))?;
            let live = LimitEntry::new(
                policy.routing_val,
                policy.limit_type,
                Source::Live,
                LimitEntryFields {
                    endpoint: policy.endpoint.clone(),
                    window_sec: policy.window_sec,
                    count_limit: Some(limit.max(0) as u64),
                    count: count.max(0) as u64,
                    ttl: Some(ttl.max(0) as u64),
                    ..Default::default()
                },
            )?;
            Ok(Decision::Throttle(vec![live]))
        }
        Some(1) => {
            let triples = &raw[1..];
            if triples.len() != policy_entries.len() * 3 {
                return Err(malformed_response(raw));
            }
            let mut live_entries = Vec::with_capacity(policy_entries.len());
            for (i, policy) in policy_entries.iter().enumerate() {
                let count = triples[i * 3];
                let limit = triples[i * 3 + 1];
                let ttl = triples[i * 3 + 2];
                let entry = LimitEntry::new(
                    policy.routing_val,
                    policy.limit_type,
                    Source::Live,
                    LimitEntryFields {
                        endpoint: policy.endpoint.clone(),
                        window_sec: policy.window_sec,
                        count_limit: Some(limit.max(0) as u64),
                        count: count.max(0) as u64,
                        ttl: Some(ttl.max(0) as u64),
                        ..Default::default()
                    },
                )?;
                live_entries.push(entry);
            }
            Ok(Decision::Allow(live_entries))
        }
        _ => Err(malformed_response(raw)),
    }
}

fn malformed_response(raw: &[i64]) -> RateLimitError {
    RateLimitError::StoreUnavailable(format!("unexpected check-and-increment response: {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limit_entry::LimitType;
    use crate::routing::RoutingValue;

    fn policy_entry(limit_type: LimitType, window_sec: u64, count_limit: u64) -> LimitEntry {
        LimitEntry::new(
            RoutingValue::Euw1,
            limit_type,
            Source::Policy,
            LimitEntryFields {
                endpoint: Some("/lol/summoner".into()),
                window_sec: Some(window_sec),
                count_limit: Some(count_limit),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn decodes_allow_response() {
        let entries = vec![
            policy_entry(LimitType::Application, 120, 100),
            policy_entry(LimitType::Application, 1, 20),
        ];
        let raw = vec![1, 1, 100, 120, 1, 20, 1];
        let decision = decode_result(&raw, &entries).unwrap();
        match decision {
            Decision::Allow(live) => {
                assert_eq!(live.len(), 2);
                assert_eq!(live[0].count, 1);
                assert_eq!(live[0].count_limit, Some(100));
                assert_eq!(live[1].window_sec, Some(1));
            }
            Decision::Throttle(_) => panic!("expected allow"),
        }
    }

    #[test]
    fn decodes_throttle_response() {
        let entries = vec![
            policy_entry(LimitType::Application, 120, 100),
            policy_entry(LimitType::Application, 1, 2),
        ];
        let raw = vec![0, 2, 2, 2, 1];
        let decision = decode_result(&raw, &entries).unwrap();
        match decision {
            Decision::Throttle(live) => {
                assert_eq!(live.len(), 1);
                assert_eq!(live[0].window_sec, Some(1));
                assert_eq!(live[0].count, 2);
                assert_eq!(live[0].count_limit, Some(2));
                assert_eq!(live[0].ttl, Some(1));
            }
            Decision::Allow(_) => panic!("expected throttle"),
        }
    }

    #[test]
    fn rejects_malformed_response() {
        assert!(decode_result(&[2], &[]).is_err());
    }
}
