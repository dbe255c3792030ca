//! Lenient instant decoding for remote document fields.
//!
//! The backing store hands out timestamps in several shapes depending on
//! which client wrote the document: RFC 3339 strings, bare dates, epoch
//! milliseconds, or `{seconds, nanoseconds}` objects. Anything that cannot
//! be interpreted decodes as `None` rather than failing the whole record.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Interpret a JSON value as an instant.
pub fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_instant_str(s),
        Value::Number(n) => {
            if let Some(ms) = n.as_i64() {
                Utc.timestamp_millis_opt(ms).single()
            } else {
                n.as_f64()
                    .and_then(|ms| Utc.timestamp_millis_opt(ms as i64).single())
            }
        }
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, u32::try_from(nanos).ok()?).single()
        }
        _ => None,
    }
}

/// Interpret a string as an instant: RFC 3339, naive date-time (UTC), or a
/// bare `YYYY-MM-DD` date taken as midnight UTC.
pub fn parse_instant_str(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Serde adapter for `Option<DateTime<Utc>>` fields.
pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_instant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_rfc3339() {
        let dt = parse_instant(&json!("2024-01-15T09:30:00+10:00")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-14T23:30:00+00:00");
    }

    #[test]
    fn parses_bare_date_as_midnight_utc() {
        let dt = parse_instant(&json!("2024-01-15")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-15T00:00:00+00:00");
    }

    #[test]
    fn parses_epoch_millis() {
        let dt = parse_instant(&json!(1_700_000_000_000i64)).unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
    }

    #[test]
    fn parses_store_timestamp_object() {
        let dt = parse_instant(&json!({"seconds": 1_700_000_000, "nanoseconds": 500})).unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
        assert_eq!(dt.timestamp_subsec_nanos(), 500);
    }

    #[test]
    fn garbage_is_none() {
        assert!(parse_instant(&json!("not a date")).is_none());
        assert!(parse_instant(&json!("")).is_none());
        assert!(parse_instant(&json!(true)).is_none());
        assert!(parse_instant(&json!({"foo": 1})).is_none());
    }

    #[test]
    fn out_of_range_nanoseconds_are_none() {
        let raw = json!({"seconds": 1_700_000_000, "nanoseconds": u64::from(u32::MAX) + 1});
        assert!(parse_instant(&raw).is_none());
    }
}
