use crate::error::RateLimitError;
use crate::limit_entry::{LimitEntry, LimitEntryFields, LimitType, Source};
use crate::routing::RoutingValue;
use std::collections::HashMap;
use std::time::SystemTime;

/// One `(name, value)` pair as returned by the outbound HTTP transport.
/// Header name matching is case-insensitive throughout this module.
pub type HeaderPair = (String, String);

pub(crate) fn header_value<'a>(headers: &'a [HeaderPair], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Parse a `N ":" W ("," N ":" W)*` header value into `(n, window_sec)` pairs,
/// used for both limit headers (`n` = count_limit) and count headers (`n` =
/// observed count).
fn parse_pairs(value: &str) -> Result<Vec<(u64, u64)>, RateLimitError> {
    value
        .split(',')
        .map(|part| {
            let mut it = part.splitn(2, ':');
            let n = it.next().unwrap_or("").trim();
            let w = it.next().unwrap_or("").trim();
            let n: u64 = n
                .parse()
                .map_err(|_| malformed(value))?;
            let w: u64 = w
                .parse()
                .map_err(|_| malformed(value))?;
            Ok((n, w))
        })
        .collect()
}

fn malformed(value: &str) -> RateLimitError {
    RateLimitError::HeaderMalformed(format!("invalid limit/count header value: {value}"))
}

fn build_scope_entries(
    routing: RoutingValue,
    endpoint: Option<&str>,
    limit_type: LimitType,
    limit_value: &str,
    count_value: Option<&str>,
) -> Result<Vec<LimitEntry>, RateLimitError> {
    let limit_pairs = parse_pairs(limit_value)?;

    let count_map: HashMap<u64, u64> = match count_value {
        Some(s) => parse_pairs(s)?.into_iter().map(|(count, window)| (window, count)).collect(),
        None => {
            tracing::warn!(%limit_type, "rate-limit count header absent, defaulting all windows to 0");
            HashMap::new()
        }
    };

    limit_pairs
        .into_iter()
        .map(|(count_limit, window_sec)| {
            let count = count_map.get(&window_sec).copied().unwrap_or_else(|| {
                tracing::warn!(%limit_type, window_sec, "count header missing this window, defaulting to 0");
                0
            });
            LimitEntry::new(
                routing,
                limit_type,
                Source::Headers,
                LimitEntryFields {
                    endpoint: endpoint.map(String::from),
                    window_sec: Some(window_sec),
                    count_limit: Some(count_limit),
                    count,
                    ..Default::default()
                },
            )
        })
        .collect()
}

/// Emit one `LimitEntry` per `(limit_type, window_sec)` pair present in the
/// response headers. Scopes whose `*-limit` header is absent are omitted
/// entirely; if neither `x-app-rate-limit` nor `x-method-rate-limit` is
/// present there is nothing to report and this returns an error rather than
/// an empty list, so the caller can decide whether to proceed blind.
pub fn parse(
    headers: &[HeaderPair],
    routing: RoutingValue,
    endpoint: Option<&str>,
) -> Result<Vec<LimitEntry>, RateLimitError> {
    let app_limit = header_value(headers, "x-app-rate-limit");
    let method_limit = header_value(headers, "x-method-rate-limit");

    if app_limit.is_none() && method_limit.is_none() {
        return Err(RateLimitError::HeaderMalformed(
            "neither x-app-rate-limit nor x-method-rate-limit present".into(),
        ));
    }

    let mut entries = Vec::new();
    if let Some(limit_value) = app_limit {
        let count_value = header_value(headers, "x-app-rate-limit-count");
        entries.extend(build_scope_entries(
            routing,
            endpoint,
            LimitType::Application,
            limit_value,
            count_value,
        )?);
    }
    if let Some(limit_value) = method_limit {
        let count_value = header_value(headers, "x-method-rate-limit-count");
        entries.extend(build_scope_entries(
            routing,
            endpoint,
            LimitType::Method,
            limit_value,
            count_value,
        )?);
    }
    Ok(entries)
}

/// Build the single cooldown entry implied by a response's back-off headers,
/// filling in the defaults for each missing piece: `x-rate-limit-type`
/// defaults to `service`, `date` defaults to `now`, `retry-after` defaults to
/// `max_ttl`.
pub fn extract_cooldown(
    headers: &[HeaderPair],
    routing: RoutingValue,
    endpoint: Option<&str>,
    now: SystemTime,
    max_ttl: u64,
) -> LimitEntry {
    let limit_type = header_value(headers, "x-rate-limit-type")
        .and_then(|s| s.parse::<LimitType>().ok())
        .unwrap_or(LimitType::Service);

    let request_time = header_value(headers, "date")
        .and_then(|s| httpdate::parse_http_date(s).ok())
        .unwrap_or(now);

    let retry_after = header_value(headers, "retry-after")
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(max_ttl);

    let endpoint = if limit_type == LimitType::Method {
        endpoint.map(String::from)
    } else {
        None
    };

    LimitEntry::new(
        routing,
        limit_type,
        Source::Headers,
        LimitEntryFields {
            endpoint,
            request_time: Some(request_time),
            retry_after: Some(retry_after),
            ..Default::default()
        },
    )
    .expect("header-derived cooldown fields always satisfy Headers-source invariants")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Vec<HeaderPair> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn parses_app_and_method_scopes() {
        let h = headers(&[
            ("x-app-rate-limit", "100:120,20:1"),
            ("x-app-rate-limit-count", "20:120,2:1"),
            ("x-method-rate-limit", "50:10"),
            ("x-method-rate-limit-count", "20:10"),
        ]);
        let entries = parse(&h, RoutingValue::Euw1, Some("/lol/summoner")).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].limit_type, LimitType::Application);
        assert_eq!(entries[0].window_sec, Some(120));
        assert_eq!(entries[0].count_limit, Some(100));
        assert_eq!(entries[0].count, 20);
        assert_eq!(entries[2].limit_type, LimitType::Method);
        assert_eq!(entries[2].count, 20);
    }

    #[test]
    fn missing_count_header_defaults_to_zero() {
        let h = headers(&[("x-app-rate-limit", "100:120")]);
        let entries = parse(&h, RoutingValue::Euw1, None).unwrap();
        assert_eq!(entries[0].count, 0);
    }

    #[test]
    fn missing_window_in_count_defaults_to_zero() {
        let h = headers(&[
            ("x-app-rate-limit", "100:120,20:1"),
            ("x-app-rate-limit-count", "20:120"),
        ]);
        let entries = parse(&h, RoutingValue::Euw1, None).unwrap();
        assert_eq!(entries[1].window_sec, Some(1));
        assert_eq!(entries[1].count, 0);
    }

    #[test]
    fn both_limit_headers_absent_is_an_error() {
        let h = headers(&[("date", "Tue, 01 Apr 2025 18:15:26 GMT")]);
        assert!(parse(&h, RoutingValue::Euw1, None).is_err());
    }

    #[test]
    fn extract_cooldown_uses_defaults_when_headers_missing() {
        let now = SystemTime::now();
        let entry = extract_cooldown(&[], RoutingValue::Euw1, None, now, 300);
        assert_eq!(entry.limit_type, LimitType::Service);
        assert_eq!(entry.retry_after, Some(300));
        assert_eq!(entry.request_time, Some(now));
    }

    #[test]
    fn extract_cooldown_reads_explicit_headers() {
        let h = headers(&[
            ("x-rate-limit-type", "application"),
            ("date", "Wed, 02 Apr 2025 18:00:00 GMT"),
            ("retry-after", "120"),
        ]);
        let entry = extract_cooldown(&h, RoutingValue::Euw1, Some("/lol/summoner"), SystemTime::now(), 300);
        assert_eq!(entry.limit_type, LimitType::Application);
        assert_eq!(entry.retry_after, Some(120));
        assert!(entry.endpoint.is_none());
    }

    #[test]
    fn extract_cooldown_keeps_endpoint_for_method_scope() {
        let h = headers(&[("x-rate-limit-type", "method")]);
        let entry = extract_cooldown(&h, RoutingValue::Euw1, Some("/lol/summoner"), SystemTime::now(), 300);
        assert_eq!(entry.endpoint.as_deref(), Some("/lol/summoner"));
    }
}
