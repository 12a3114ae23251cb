use crate::error::RateLimitError;
use crate::limit_entry::LimitType;
use crate::routing::RoutingValue;

/// Which store-key family a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    PolicyLimit,
    PolicyWindows,
    LiveCounter,
    AuthoritativeCounter,
    Cooldown,
}

/// The subset of `LimitEntry` fields a store key actually encodes. Decoding
/// a key only ever recovers these — not `count_limit`, `count`, `ttl`, etc.,
/// which live in the *value* at that key, not its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFields {
    pub routing_val: RoutingValue,
    pub endpoint: Option<String>,
    pub limit_type: LimitType,
}

impl KeyFields {
    pub fn new(routing_val: RoutingValue, endpoint: Option<String>, limit_type: LimitType) -> Self {
        Self { routing_val, endpoint, limit_type }
    }
}

fn require_endpoint<'a>(fields: &'a KeyFields, kind: KeyKind) -> Result<&'a str, RateLimitError> {
    fields.endpoint.as_deref().ok_or_else(|| {
        RateLimitError::InvariantViolated(format!("{kind:?} keys require an endpoint"))
    })
}

fn validate_endpoint(endpoint: &str) -> Result<(), RateLimitError> {
    if endpoint.contains(':') {
        return Err(RateLimitError::InvariantViolated(
            "endpoint must not contain ':'".into(),
        ));
    }
    Ok(())
}

/// Encode a store key. `window_sec` is required for every kind except
/// `PolicyWindows` and `Cooldown`, which are not window-scoped.
pub fn encode(
    kind: KeyKind,
    fields: &KeyFields,
    window_sec: Option<u64>,
) -> Result<String, RateLimitError> {
    match kind {
        KeyKind::PolicyWindows => {
            let endpoint = require_endpoint(fields, kind)?;
            validate_endpoint(endpoint)?;
            Ok(format!(
                "riot:v1:policy:{}:{}:{}:windows",
                fields.routing_val, endpoint, fields.limit_type
            ))
        }
        KeyKind::PolicyLimit => {
            let endpoint = require_endpoint(fields, kind)?;
            validate_endpoint(endpoint)?;
            let window_sec = window_sec.ok_or_else(|| {
                RateLimitError::InvariantViolated("policy_limit keys require window_sec".into())
            })?;
            Ok(format!(
                "riot:v1:policy:{}:{}:{}:window:{}:limit",
                fields.routing_val, endpoint, fields.limit_type, window_sec
            ))
        }
        KeyKind::LiveCounter => {
            let endpoint = require_endpoint(fields, kind)?;
            validate_endpoint(endpoint)?;
            let window_sec = window_sec.ok_or_else(|| {
                RateLimitError::InvariantViolated("live_counter keys require window_sec".into())
            })?;
            Ok(format!(
                "lol_api:v1:live:{}:{}:{}:window:{}",
                fields.routing_val, endpoint, fields.limit_type, window_sec
            ))
        }
        KeyKind::AuthoritativeCounter => {
            let endpoint = require_endpoint(fields, kind)?;
            validate_endpoint(endpoint)?;
            let window_sec = window_sec.ok_or_else(|| {
                RateLimitError::InvariantViolated(
                    "authoritative_counter keys require window_sec".into(),
                )
            })?;
            Ok(format!(
                "riot:v1:authoritative:{}:{}:{}:window:{}",
                fields.routing_val, endpoint, fields.limit_type, window_sec
            ))
        }
        KeyKind::Cooldown => match fields.limit_type {
            LimitType::Method => {
                let endpoint = require_endpoint(fields, kind)?;
                validate_endpoint(endpoint)?;
                Ok(format!(
                    "lol_api:v1:cooldown:{}:{}:{}",
                    fields.routing_val, endpoint, fields.limit_type
                ))
            }
            LimitType::Application | LimitType::Service => Ok(format!(
                "lol_api:v1:cooldown:{}:{}",
                fields.routing_val, fields.limit_type
            )),
        },
    }
}

/// Decode a store key, inferring its kind from the namespace/version/mode
/// prefix. The mode segment is matched before any segment-count branching so
/// a 5-segment cooldown key (no endpoint) is never mistaken for a malformed
/// window-scoped key, and vice versa for a 6-segment one.
pub fn decode(key: &str) -> Result<(KeyKind, KeyFields, Option<u64>), RateLimitError> {
    let parts: Vec<&str> = key.split(':').collect();
    if parts.len() < 5 {
        return Err(malformed(key));
    }
    let (namespace, version, mode) = (parts[0], parts[1], parts[2]);
    if version != "v1" {
        return Err(malformed(key));
    }

    match mode {
        "cooldown" => {
            if namespace != "lol_api" {
                return Err(malformed(key));
            }
            match parts.len() {
                5 => {
                    let routing_val = parse_routing(parts[3], key)?;
                    let limit_type = parse_limit_type(parts[4], key)?;
                    if limit_type == LimitType::Method {
                        // A method cooldown always carries an endpoint; a
                        // 5-segment key claiming limit_type=method is malformed
                        // rather than "method with no endpoint".
                        return Err(malformed(key));
                    }
                    Ok((KeyKind::Cooldown, KeyFields::new(routing_val, None, limit_type), None))
                }
                6 => {
                    let routing_val = parse_routing(parts[3], key)?;
                    let endpoint = parts[4].to_string();
                    let limit_type = parse_limit_type(parts[5], key)?;
                    Ok((
                        KeyKind::Cooldown,
                        KeyFields::new(routing_val, Some(endpoint), limit_type),
                        None,
                    ))
                }
                _ => Err(malformed(key)),
            }
        }
        "policy" => {
            if namespace != "riot" {
                return Err(malformed(key));
            }
            if parts.len() == 7 && parts[6] == "windows" {
                let routing_val = parse_routing(parts[3], key)?;
                let endpoint = parts[4].to_string();
                let limit_type = parse_limit_type(parts[5], key)?;
                Ok((
                    KeyKind::PolicyWindows,
                    KeyFields::new(routing_val, Some(endpoint), limit_type),
                    None,
                ))
            } else if parts.len() == 9 && parts[6] == "window" && parts[8] == "limit" {
                let routing_val = parse_routing(parts[3], key)?;
                let endpoint = parts[4].to_string();
                let limit_type = parse_limit_type(parts[5], key)?;
                let window_sec = parse_window(parts[7], key)?;
                Ok((
                    KeyKind::PolicyLimit,
                    KeyFields::new(routing_val, Some(endpoint), limit_type),
                    Some(window_sec),
                ))
            } else {
                Err(malformed(key))
            }
        }
        "live" => {
            if namespace != "lol_api" || parts.len() != 8 || parts[6] != "window" {
                return Err(malformed(key));
            }
            let routing_val = parse_routing(parts[3], key)?;
            let endpoint = parts[4].to_string();
            let limit_type = parse_limit_type(parts[5], key)?;
            let window_sec = parse_window(parts[7], key)?;
            Ok((
                KeyKind::LiveCounter,
                KeyFields::new(routing_val, Some(endpoint), limit_type),
                Some(window_sec),
            ))
        }
        "authoritative" => {
            if namespace != "riot" || parts.len() != 8 || parts[6] != "window" {
                return Err(malformed(key));
            }
            let routing_val = parse_routing(parts[3], key)?;
            let endpoint = parts[4].to_string();
            let limit_type = parse_limit_type(parts[5], key)?;
            let window_sec = parse_window(parts[7], key)?;
            Ok((
                KeyKind::AuthoritativeCounter,
                KeyFields::new(routing_val, Some(endpoint), limit_type),
                Some(window_sec),
            ))
        }
        _ => Err(malformed(key)),
    }
}

fn malformed(key: &str) -> RateLimitError {
    RateLimitError::InvariantViolated(format!("key does not match a known template: {key}"))
}

fn parse_routing(s: &str, key: &str) -> Result<RoutingValue, RateLimitError> {
    s.parse().map_err(|_| malformed(key))
}

fn parse_limit_type(s: &str, key: &str) -> Result<LimitType, RateLimitError> {
    s.parse().map_err(|_| malformed(key))
}

fn parse_window(s: &str, key: &str) -> Result<u64, RateLimitError> {
    s.parse::<u64>().map_err(|_| malformed(key))
}
