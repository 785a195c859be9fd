//! Human-readable durations for config files: `"5us"`, `"200ms"`, `"2s"`.
//!
//! Use with `#[serde(with = "crate::duration")]`, or
//! `#[serde(with = "crate::duration::option")]` for `Option<Duration>`.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

use crate::error::ConfigError;

const UNITS: [(&str, u64); 6] = [
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60_000_000_000),
];

/// Parse `<integer><unit>` where unit is one of `ns`, `us`, `µs`, `ms`, `s`,
/// `m`. A bare integer is seconds.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let trimmed = input.trim();
    let invalid = |reason| ConfigError::Duration {
        input: input.to_string(),
        reason,
    };
    if trimmed.is_empty() {
        return Err(invalid("duration must not be empty"));
    }

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    if number.is_empty() {
        return Err(invalid("missing numeric value"));
    }
    let value: u64 = number.parse().map_err(|_| invalid("value out of range"))?;

    let nanos_per_unit = match unit.trim() {
        "" => 1_000_000_000,
        unit => UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, nanos)| *nanos)
            .ok_or_else(|| invalid("unknown unit (expected ns, us, ms, s or m)"))?,
    };
    let nanos = value
        .checked_mul(nanos_per_unit)
        .ok_or_else(|| invalid("value out of range"))?;
    Ok(Duration::from_nanos(nanos))
}

/// Format with the largest unit that represents the value exactly.
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    for (unit, per) in [("s", 1_000_000_000u128), ("ms", 1_000_000), ("us", 1_000)] {
        if nanos % per == 0 {
            return format!("{}{unit}", nanos / per);
        }
    }
    format!("{nanos}ns")
}

pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(*duration))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

pub mod option {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match duration {
            Some(duration) => super::serialize(duration, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| super::parse_duration(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}
