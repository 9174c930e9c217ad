//! Durations in `config.toml` are plain integers
//!
//! Connect timeouts and the watchdog interval are written in seconds;
//! the join and heartbeat timeouts need finer steps and use milliseconds.

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

fn serialize_units<S: Serializer>(
    duration: &Duration,
    units_per_sec: u128,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let units = duration.as_nanos() * units_per_sec / 1_000_000_000;
    serializer.serialize_u64(u64::try_from(units).unwrap_or(u64::MAX))
}

fn deserialize_units<'de, D: Deserializer<'de>>(
    deserializer: D,
    from_units: fn(u64) -> Duration,
) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(from_units)
}

/// `#[serde(with = "duration_secs")]`: whole seconds, sub-second part dropped
pub mod duration_secs {
    use super::*;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_units(duration, 1, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        deserialize_units(deserializer, Duration::from_secs)
    }
}

/// `#[serde(with = "duration_millis")]`: whole milliseconds
pub mod duration_millis {
    use super::*;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_units(duration, 1_000, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        deserialize_units(deserializer, Duration::from_millis)
    }
}
