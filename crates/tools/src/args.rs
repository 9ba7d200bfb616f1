//! Argument helpers shared by the built-in tools.
//!
//! Arguments have already passed schema validation by the time a tool sees
//! them, so these helpers only deal with optional keys, clamping, and the
//! loose date formats the model tends to produce.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use slo_core::{Patch, ToolError};

/// A non-empty string argument.
pub fn opt_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// An integer argument clamped into `[1, max]`, or `default` when absent.
pub fn clamp_limit(args: &Value, key: &str, default: i64, max: i64) -> usize {
    let raw = args.get(key).and_then(Value::as_i64).unwrap_or(default);
    raw.clamp(1, max) as usize
}

/// Truncate to at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Parse an ISO-8601 timestamp. Naive values are taken as UTC and bare dates
/// as midnight UTC.
pub fn parse_iso(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// An optional timestamp argument; unparseable values are ignored.
pub fn opt_datetime(args: &Value, key: &str) -> Option<DateTime<Utc>> {
    opt_str(args, key).and_then(parse_iso)
}

/// Patch for a nullable timestamp: absent keeps, `null`/empty clears, a
/// parseable value sets, anything else keeps.
pub fn datetime_patch(args: &Value, key: &str) -> Patch<Option<DateTime<Utc>>> {
    match args.get(key) {
        None => Patch::Keep,
        Some(Value::Null) => Patch::Set(None),
        Some(Value::String(s)) if s.trim().is_empty() => Patch::Set(None),
        Some(Value::String(s)) => parse_iso(s).map_or(Patch::Keep, |dt| Patch::Set(Some(dt))),
        Some(_) => Patch::Keep,
    }
}

/// Patch for a nullable text field: absent keeps, `null`/empty clears.
pub fn text_patch(args: &Value, key: &str) -> Patch<Option<String>> {
    match args.get(key) {
        None => Patch::Keep,
        Some(v) => Patch::Set(v.as_str().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)),
    }
}

/// A tool-level validation failure, reported to the model as a result.
pub fn invalid(reason: impl std::fmt::Display) -> Value {
    serde_json::json!({ "error": format!("invalid_arguments: {reason}") })
}

/// Serialize a store record for a tool result.
pub fn to_json<T: serde::Serialize>(tool_name: &str, value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::ExecutionFailed {
        tool_name: tool_name.to_string(),
        reason: e.to_string(),
    })
}
