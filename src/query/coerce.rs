//! Coercion of extracted values into the types components track.

use serde_json::Value;

use crate::error::{Error, Result};

/// Coerce an extracted value into a number.
///
/// Accepts JSON numbers, numeric strings (surrounding whitespace ignored) and
/// booleans (`1.0`/`0.0`). Null, arrays, objects and non-finite results fail.
pub fn coerce_number(value: &Value) -> Result<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };

    number.filter(|n| n.is_finite()).ok_or_else(|| Error::Coercion {
        value: value.to_string(),
        expected: "number",
    })
}

/// Coerce an extracted value into a string.
///
/// Strings pass through verbatim; anything else becomes its compact JSON text,
/// so a null result reads as `null`.
pub fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
