//! Lenient field coercion for JSON payloads
//!
//! Upstream senders are loose about types: numbers arrive as strings,
//! booleans as `0`/`1` or `"on"`. These helpers accept every form seen on
//! the wire and return `None` for anything else, leaving the caller to
//! substitute a default and record a [`FieldWarning`](crate::FieldWarning).

use serde_json::Value;

/// Parse a float from a JSON number or numeric string
pub fn as_f32(value: &Value) -> Option<f32> {
    let parsed = match value {
        Value::Number(n) => n.as_f64().map(|v| v as f32),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Parse an integer from a JSON number or numeric string.
///
/// Integral floats (`3.0`) are accepted; fractional values are not.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

/// Parse a non-negative integer
pub fn as_u32(value: &Value) -> Option<u32> {
    as_i64(value).and_then(|v| u32::try_from(v).ok())
}

/// Normalise a boolean switch
pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Some(true),
            "0" | "false" | "off" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Plain string; numbers are rendered rather than rejected
pub fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer list from a JSON array or a comma/space separated string.
///
/// Returns `None` if any element fails to parse.
pub fn as_int_list(value: &Value) -> Option<Vec<i64>> {
    match value {
        Value::Array(items) => items.iter().map(as_i64).collect(),
        Value::String(s) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<i64>().ok())
            .collect(),
        Value::Number(_) => as_i64(value).map(|v| vec![v]),
        _ => None,
    }
}
