//! Scalar coercion
//!
//! Every value that crosses the untyped boundary goes through one of these
//! functions. They never fail: anything they cannot interpret collapses to a
//! neutral default (0, empty string, `None`).

use chrono::DateTime;
use serde_json::Value;

/// Shortest accepted address body after the `inj` prefix
const ADDRESS_MIN_BODY: usize = 20;

/// Longest accepted address body after the `inj` prefix
const ADDRESS_MAX_BODY: usize = 80;

/// Coerce an arbitrary JSON value to a finite number, falling back to 0
pub fn coerce_number(value: Option<&Value>) -> f64 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };

    number.filter(|n| n.is_finite()).unwrap_or(0.0)
}

/// Stringify an arbitrary JSON value, truncated to `max_len` characters
pub fn coerce_string(value: Option<&Value>, max_len: usize) -> String {
    let rendered = match value {
        None | Some(Value::Null) => return String::new(),
        Some(Value::String(s)) => return truncate_chars(s, max_len),
        Some(Value::Number(n)) => render_number(n),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    };
    truncate_chars(&rendered, max_len)
}

/// Interpret a value as a millisecond Unix timestamp.
///
/// Accepts positive finite numbers, numeric strings and RFC 3339 strings.
pub fn coerce_timestamp(value: Option<&Value>) -> Option<i64> {
    let millis = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            match trimmed.parse::<f64>() {
                Ok(n) => n,
                Err(_) => DateTime::parse_from_rfc3339(trimmed).ok()?.timestamp_millis() as f64,
            }
        }
        _ => return None,
    };

    if millis.is_finite() && millis > 0.0 && millis < i64::MAX as f64 {
        Some(millis.trunc() as i64)
    } else {
        None
    }
}

/// Validate an Injective account address.
///
/// Accepts `inj` followed by 20-80 ASCII alphanumerics, case-insensitively.
/// The accepted address is returned lowercased so that storage keys are stable.
pub fn validate_address(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let (prefix, body) = trimmed.split_at_checked(3)?;
    if !prefix.eq_ignore_ascii_case("inj") {
        return None;
    }
    if !(ADDRESS_MIN_BODY..=ADDRESS_MAX_BODY).contains(&body.len()) {
        return None;
    }
    if !body.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    Some(trimmed.to_ascii_lowercase())
}

/// Truncate a string to at most `max_len` characters
pub fn truncate_chars(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn render_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}
