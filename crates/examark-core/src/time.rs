//! Wire timestamps.
//!
//! Timestamps travel as integer epoch milliseconds. Parsing is lenient:
//! integer millis, float millis, RFC 3339 strings, and numeric strings are
//! all accepted, and anything malformed is normalized to the epoch sentinel
//! instead of failing the surrounding record. Serialization always emits
//! integer milliseconds.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// The sentinel timestamp for absent or malformed wire values.
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// Current wall-clock time.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Build a timestamp from epoch milliseconds, clamping out-of-range input
/// to the sentinel.
#[must_use]
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(epoch)
}

/// Parse a raw wire value into a timestamp, if it has a usable shape.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_wire_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(from_millis),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| s.parse::<i64>().ok().map(from_millis)),
        _ => None,
    }
}

fn normalize(value: &Value) -> DateTime<Utc> {
    parse_wire_timestamp(value).unwrap_or_else(|| {
        tracing::debug!(%value, "malformed timestamp normalized to epoch");
        epoch()
    })
}

/// Serde adapter for required timestamp fields.
///
/// Pair with `#[serde(default = "crate::time::epoch")]` so absent fields get
/// the sentinel as well.
pub mod lenient_millis {
    use super::{normalize, Value};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Emit integer epoch milliseconds.
    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(ts.timestamp_millis())
    }

    /// Accept any wire shape; malformed values become the epoch sentinel.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(normalize(&value))
    }
}

/// Serde adapter for optional timestamp fields.
///
/// Absent and `null` both deserialize to `None`; a present-but-malformed
/// value becomes `Some(epoch)` so "they sent something" is preserved.
pub mod lenient_millis_opt {
    use super::{normalize, Value};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Emit integer epoch milliseconds, or nothing.
    pub fn serialize<S>(ts: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match ts {
            Some(ts) => serializer.serialize_i64(ts.timestamp_millis()),
            None => serializer.serialize_none(),
        }
    }

    /// Accept any wire shape; `null` is absent, malformed is `Some(epoch)`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(normalize(&value))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
