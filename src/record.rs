use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::types::UsageRecord;

/// Field names tried per direction, in order. The first one holding a
/// non-negative integer wins.
const INPUT_FIELDS: &[&str] = &["input", "input_tokens"];
const OUTPUT_FIELDS: &[&str] = &["output", "output_tokens"];

/// Why a line did not yield a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineError {
    /// Not valid JSON (truncated mid-write, binary noise, ...).
    Malformed,
    /// Valid JSON without a usage block; session metadata, tool calls, etc.
    NoUsage,
}

/// Decode one session log line.
///
/// The usage block is read from `message.usage`, falling back to a top-level
/// `usage`. The timestamp is read from `message.timestamp`, then `timestamp`,
/// and may be epoch milliseconds or an RFC 3339 string.
pub fn parse_line(line: &str) -> Result<UsageRecord, LineError> {
    let parsed: Value = serde_json::from_str(line).map_err(|_| LineError::Malformed)?;
    extract_record(&parsed).ok_or(LineError::NoUsage)
}

fn extract_record(parsed: &Value) -> Option<UsageRecord> {
    let message = parsed.get("message");
    let usage = message
        .and_then(|m| m.get("usage"))
        .or_else(|| parsed.get("usage"))
        .filter(|u| u.is_object())?;

    let timestamp_ms = message
        .and_then(|m| m.get("timestamp"))
        .or_else(|| parsed.get("timestamp"))
        .and_then(timestamp_millis);

    Some(UsageRecord {
        timestamp_ms,
        input_tokens: token_field(usage, INPUT_FIELDS),
        output_tokens: token_field(usage, OUTPUT_FIELDS),
    })
}

fn token_field(usage: &Value, names: &[&str]) -> u64 {
    names
        .iter()
        .find_map(|name| usage.get(*name).and_then(|v| v.as_u64()))
        .unwrap_or(0)
}

fn timestamp_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s
            .parse::<DateTime<Utc>>()
            .ok()
            .map(|dt| dt.timestamp_millis()),
        _ => None,
    }
}
