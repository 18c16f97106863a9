//! Lenient field conversions for provider payloads and timestamp helpers.

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Timelike, Utc};
use serde_json::Value;

/// Parse an integer from a JSON string or number; `None` for anything else.
pub fn parse_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub fn parse_int_or(value: Option<&Value>, default: i64) -> i64 {
    parse_int(value).unwrap_or(default)
}

/// Non-empty string form of a JSON scalar. Numbers are rendered, not rejected.
pub fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First non-empty string among several aliases of the same field.
pub fn first_text(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text(item.get(*key)))
}

pub fn lower_address(value: Option<&Value>) -> String {
    text(value).map(|s| s.to_lowercase()).unwrap_or_default()
}

pub fn ts_to_utc(unix_ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(unix_ts, 0)
        .single()
        .unwrap_or_default()
}

/// Storage form of a timestamp: RFC 3339, UTC, `Z` suffix.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Floor to the enclosing 6-hour bucket: 00:00, 06:00, 12:00 or 18:00 UTC.
pub fn floor_to_6h(ts: DateTime<Utc>) -> DateTime<Utc> {
    let bucket_hour = (ts.hour() / 6) * 6;
    let midnight = ts
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(ts);
    midnight + Duration::hours(i64::from(bucket_hour))
}

/// Human-friendly bucket id, e.g. `2025/09/16-12:00`.
pub fn trigger_id_for(bucket_start: DateTime<Utc>) -> String {
    bucket_start.format("%Y/%m/%d-%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_int_lenient() {
        assert_eq!(parse_int(Some(&json!("123"))), Some(123));
        assert_eq!(parse_int(Some(&json!(45))), Some(45));
        assert_eq!(parse_int(Some(&json!("0x1f"))), None);
        assert_eq!(parse_int(None), None);
        assert_eq!(parse_int_or(Some(&json!("")), 18), 18);
    }

    #[test]
    fn test_first_text_uses_aliases_in_order() {
        let item = json!({"holderAddress": "0xAbC", "address": "0xdef"});
        let found = first_text(&item, &["TokenHolderAddress", "holderAddress", "address"]);
        assert_eq!(found.as_deref(), Some("0xAbC"));
        assert_eq!(first_text(&item, &["missing"]), None);
    }

    #[test]
    fn test_floor_to_6h_buckets() {
        let ts = parse_ts("2025-09-16T17:59:59Z").unwrap();
        assert_eq!(format_ts(&floor_to_6h(ts)), "2025-09-16T12:00:00.000Z");

        let ts = parse_ts("2025-09-16T00:00:00Z").unwrap();
        assert_eq!(floor_to_6h(ts), ts);
    }

    #[test]
    fn test_trigger_id_and_ts_to_utc() {
        let bucket = ts_to_utc(1758024000);
        assert_eq!(trigger_id_for(bucket), "2025/09/16-12:00");
        assert_eq!(format_ts(&ts_to_utc(0)), "1970-01-01T00:00:00.000Z");
    }
}
