use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Deserialize a human-readable duration such as `"60s"` or `"30m"`
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(serde::de::Error::custom)
}

/// Same as [`deserialize`] for optional fields
pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|s| parse(&s).map_err(serde::de::Error::custom)).transpose()
}

fn parse(raw: &str) -> Result<Duration, String> {
    duration_str::parse(raw).map_err(|e| format!("invalid duration '{raw}': {e}"))
}
