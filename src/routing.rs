use crate::error::RateLimitError;
use std::fmt;
use std::str::FromStr;

/// The upstream's routing host identity. Platform routes are per-region
/// data-center hosts (`euw1`, `na1`, ...); regional routes front several
/// platform routes for account-wide endpoints (`americas`, `asia`, ...).
///
/// This is a compile-time sum type rather than a free-form string precisely
/// because parsing a routing value is the boundary where an unknown region
/// must be rejected, not silently namespaced alongside the real ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutingValue {
    Na1,
    Euw1,
    Eun1,
    Kr,
    Jp1,
    Br1,
    La1,
    La2,
    Oc1,
    Tr1,
    Ru,
    Ph2,
    Sg2,
    Th2,
    Tw2,
    Vn2,
    Americas,
    Asia,
    Europe,
    Esports,
}

impl RoutingValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingValue::Na1 => "na1",
            RoutingValue::Euw1 => "euw1",
            RoutingValue::Eun1 => "eun1",
            RoutingValue::Kr => "kr",
            RoutingValue::Jp1 => "jp1",
            RoutingValue::Br1 => "br1",
            RoutingValue::La1 => "la1",
            RoutingValue::La2 => "la2",
            RoutingValue::Oc1 => "oc1",
            RoutingValue::Tr1 => "tr1",
            RoutingValue::Ru => "ru",
            RoutingValue::Ph2 => "ph2",
            RoutingValue::Sg2 => "sg2",
            RoutingValue::Th2 => "th2",
            RoutingValue::Tw2 => "tw2",
            RoutingValue::Vn2 => "vn2",
            RoutingValue::Americas => "americas",
            RoutingValue::Asia => "asia",
            RoutingValue::Europe => "europe",
            RoutingValue::Esports => "esports",
        }
    }
}

impl fmt::Display for RoutingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingValue {
    type Err = RateLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "na1" => Ok(RoutingValue::Na1),
            "euw1" => Ok(RoutingValue::Euw1),
            "eun1" => Ok(RoutingValue::Eun1),
            "kr" => Ok(RoutingValue::Kr),
            "jp1" => Ok(RoutingValue::Jp1),
            "br1" => Ok(RoutingValue::Br1),
            "la1" => Ok(RoutingValue::La1),
            "la2" => Ok(RoutingValue::La2),
            "oc1" => Ok(RoutingValue::Oc1),
            "tr1" => Ok(RoutingValue::Tr1),
            "ru" => Ok(RoutingValue::Ru),
            "ph2" => Ok(RoutingValue::Ph2),
            "sg2" => Ok(RoutingValue::Sg2),
            "th2" => Ok(RoutingValue::Th2),
            "tw2" => Ok(RoutingValue::Tw2),
            "vn2" => Ok(RoutingValue::Vn2),
            "americas" => Ok(RoutingValue::Americas),
            "asia" => Ok(RoutingValue::Asia),
            "europe" => Ok(RoutingValue::Europe),
            "esports" => Ok(RoutingValue::Esports),
            other => Err(RateLimitError::InvariantViolated(format!(
                "unknown routing value: {other}"
            ))),
        }
    }
}
