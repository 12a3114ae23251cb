use crate::error::RateLimitError;
use crate::routing::RoutingValue;
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

/// Quota scope. Only `Application` and `Method` ever appear in policy
/// entries; all three may appear in cooldown entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LimitType {
    Application,
    Method,
    Service,
}

impl LimitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitType::Application => "application",
            LimitType::Method => "method",
            LimitType::Service => "service",
        }
    }
}

impl fmt::Display for LimitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LimitType {
    type Err = RateLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "application" => Ok(LimitType::Application),
            "method" => Ok(LimitType::Method),
            "service" => Ok(LimitType::Service),
            other => Err(RateLimitError::HeaderMalformed(format!(
                "unknown x-rate-limit-type: {other}"
            ))),
        }
    }
}

/// Provenance of a `LimitEntry` — which component produced it and under
/// what contract (the invariants below are keyed off this).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Headers,
    Policy,
    Live,
    Cooldown,
}

/// The universal message between components: an immutable value describing
/// a single quota fact or a single observation.
#[derive(Debug, Clone)]
pub struct LimitEntry {
    pub routing_val: RoutingValue,
    pub endpoint: Option<String>,
    pub limit_type: LimitType,
    pub window_sec: Option<u64>,
    pub count_limit: Option<u64>,
    pub count: u64,
    pub request_time: Option<SystemTime>,
    pub retry_after: Option<u64>,
    pub ttl: Option<u64>,
    pub adjusted_ttl: Option<u64>,
    pub source: Source,
}

/// Fields used to build a `LimitEntry`, mirroring its non-identity fields;
/// `count` defaults to 0.
#[derive(Debug, Clone, Default)]
pub struct LimitEntryFields {
    pub endpoint: Option<String>,
    pub window_sec: Option<u64>,
    pub count_limit: Option<u64>,
    pub count: u64,
    pub request_time: Option<SystemTime>,
    pub retry_after: Option<u64>,
    pub ttl: Option<u64>,
    pub adjusted_ttl: Option<u64>,
}

impl LimitEntry {
    /// Smart constructor. Fails on any invariant violation below —
    /// upstream data that breaks an invariant is a protocol bug and must
    /// surface here, not be silently clamped or defaulted.
    pub fn new(
        routing_val: RoutingValue,
        limit_type: LimitType,
        source: Source,
        fields: LimitEntryFields,
    ) -> Result<Self, RateLimitError> {
        let entry = LimitEntry {
            routing_val,
            endpoint: fields.endpoint,
            limit_type,
            window_sec: fields.window_sec,
            count_limit: fields.count_limit,
            count: fields.count,
            request_time: fields.request_time,
            retry_after: fields.retry_after,
            ttl: fields.ttl,
            adjusted_ttl: fields.adjusted_ttl,
            source,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Returns a copy with `count` replaced, re-validating invariants. Used
    /// by `Admission` to materialize the post-increment live entry without
    /// hand-rolling field copies at every call site.
    pub fn with_count(&self, count: u64) -> Result<Self, RateLimitError> {
        let mut next = self.clone();
        next.count = count;
        next.validate()?;
        Ok(next)
    }

    pub fn with_ttl(&self, ttl: u64) -> Result<Self, RateLimitError> {
        let mut next = self.clone();
        next.ttl = Some(ttl);
        next.validate()?;
        Ok(next)
    }

    fn validate(&self) -> Result<(), RateLimitError> {
        if let Some(w) = self.window_sec {
            if w == 0 {
                return Err(RateLimitError::InvariantViolated(
                    "window_sec must be positive when set".into(),
                ));
            }
        }
        if let Some(c) = self.count_limit {
            if c == 0 {
                return Err(RateLimitError::InvariantViolated(
                    "count_limit must be positive when set".into(),
                ));
            }
        }
        if let Some(ra) = self.retry_after {
            if ra == 0 {
                return Err(RateLimitError::InvariantViolated(
                    "retry_after must be positive when set".into(),
                ));
            }
        }

        match self.source {
            Source::Cooldown => {
                if self.limit_type == LimitType::Method && self.endpoint.is_none() {
                    return Err(RateLimitError::InvariantViolated(
                        "cooldown entries for limit_type=method must carry an endpoint".into(),
                    ));
                }
            }
            Source::Policy => {
                if self.window_sec.is_none() || self.count_limit.is_none() {
                    return Err(RateLimitError::InvariantViolated(
                        "policy entries require window_sec and count_limit".into(),
                    ));
                }
                if self.limit_type == LimitType::Service {
                    return Err(RateLimitError::InvariantViolated(
                        "service scope has no policy representation, only cooldown".into(),
                    ));
                }
            }
            Source::Live => {
                if self.count_limit.is_none() || self.ttl.is_none() {
                    return Err(RateLimitError::InvariantViolated(
                        "live entries require count_limit and ttl".into(),
                    ));
                }
            }
            Source::Headers => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routing() -> RoutingValue {
        RoutingValue::Euw1
    }

    #[test]
    fn rejects_zero_window() {
        let err = LimitEntry::new(
            routing(),
            LimitType::Application,
            Source::Policy,
            LimitEntryFields {
                window_sec: Some(0),
                count_limit: Some(10),
                ..Default::default()
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn policy_requires_window_and_limit() {
        let err = LimitEntry::new(
            routing(),
            LimitType::Application,
            Source::Policy,
            LimitEntryFields {
                window_sec: Some(60),
                ..Default::default()
            },
        );
        assert!(matches!(err, Err(RateLimitError::InvariantViolated(_))));
    }

    #[test]
    fn policy_rejects_service_scope() {
        let err = LimitEntry::new(
            routing(),
            LimitType::Service,
            Source::Policy,
            LimitEntryFields {
                window_sec: Some(60),
                count_limit: Some(10),
                ..Default::default()
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn cooldown_method_requires_endpoint() {
        let err = LimitEntry::new(
            routing(),
            LimitType::Method,
            Source::Cooldown,
            LimitEntryFields::default(),
        );
        assert!(err.is_err());

        let ok = LimitEntry::new(
            routing(),
            LimitType::Method,
            Source::Cooldown,
            LimitEntryFields {
                endpoint: Some("/lol/summoner".into()),
                ..Default::default()
            },
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn cooldown_application_allows_absent_endpoint() {
        let ok = LimitEntry::new(
            routing(),
            LimitType::Application,
            Source::Cooldown,
            LimitEntryFields::default(),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn live_requires_limit_and_ttl() {
        let err = LimitEntry::new(
            routing(),
            LimitType::Application,
            Source::Live,
            LimitEntryFields {
                count: 1,
                count_limit: Some(10),
                ..Default::default()
            },
        );
        assert!(err.is_err());

        let ok = LimitEntry::new(
            routing(),
            LimitType::Application,
            Source::Live,
            LimitEntryFields {
                count: 1,
                count_limit: Some(10),
                ttl: Some(60),
                ..Default::default()
            },
        );
        assert!(ok.is_ok());
    }
}
