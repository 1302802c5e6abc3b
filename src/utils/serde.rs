/*!
 * Serde utilities for common serialization/deserialization patterns.
 *
 * Slow query statistics are persisted as JSONB. Durations are stored as
 * integer microseconds so the payload stays readable from SQL and stable
 * across releases.
 */

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Serialize a [`Duration`] as whole microseconds.
///
/// Deserialization accepts an integer, a float (truncated), or a numeric
/// string, since payloads written by other tools are not always strict.
///
/// # Usage with serde
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
///
/// #[derive(Serialize, Deserialize)]
/// struct Timing {
///     #[serde(with = "rollout_core::utils::serde::duration_micros")]
///     elapsed: Duration,
/// }
/// ```
pub mod duration_micros {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        serializer.serialize_u64(micros)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let value = serde_json::Value::deserialize(deserializer)?;
        let micros = match value {
            serde_json::Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    u
                } else if let Some(f) = n.as_f64() {
                    if f < 0.0 {
                        return Err(D::Error::custom(format!("Negative duration: {f}")));
                    }
                    f as u64
                } else {
                    return Err(D::Error::custom(format!("Invalid duration value: {n}")));
                }
            }
            serde_json::Value::String(s) => s
                .parse::<u64>()
                .map_err(|_| D::Error::custom(format!("Cannot parse '{s}' as microseconds")))?,
            other => {
                return Err(D::Error::custom(format!(
                    "Expected duration in microseconds, found: {other:?}"
                )))
            }
        };
        Ok(Duration::from_micros(micros))
    }
}
