//! Canonical string form of evaluation results.

use cel_interpreter::objects::Key;
use cel_interpreter::Value as CelValue;
use serde_json::{Map, Number, Value};

use super::extensions::as_optional;

/// Renders a value the way the boundary reports it.
///
/// Scalars print bare (`30.0` prints as `30`), `null` prints as `null`,
/// bytes as lossy UTF-8, and lists and maps as compact JSON. An optional
/// prints its contents, or `optional.none()` when empty.
pub fn render(value: &CelValue) -> String {
    match value {
        CelValue::String(s) => s.to_string(),
        CelValue::Bool(b) => b.to_string(),
        CelValue::Int(i) => i.to_string(),
        CelValue::UInt(u) => u.to_string(),
        CelValue::Float(f) => f.to_string(),
        CelValue::Null => "null".to_string(),
        CelValue::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        CelValue::List(_) | CelValue::Map(_) => to_json(value).to_string(),
        other => match as_optional(other) {
            Some(Some(inner)) => render(inner),
            Some(None) => "optional.none()".to_string(),
            None => format!("{:?}", other),
        },
    }
}

/// Converts a value to JSON. Integral doubles become JSON integers.
pub fn to_json(value: &CelValue) -> Value {
    match value {
        CelValue::String(s) => Value::String(s.to_string()),
        CelValue::Bool(b) => Value::Bool(*b),
        CelValue::Int(i) => Value::from(*i),
        CelValue::UInt(u) => Value::from(*u),
        CelValue::Float(f) => float_to_json(*f),
        CelValue::Null => Value::Null,
        CelValue::Bytes(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        CelValue::List(items) => Value::Array(items.iter().map(to_json).collect()),
        CelValue::Map(map) => {
            let object: Map<String, Value> = map
                .map
                .iter()
                .map(|(key, value)| (key_to_string(key), to_json(value)))
                .collect();
            Value::Object(object)
        }
        other => match as_optional(other) {
            Some(inner) => inner.map(to_json).unwrap_or(Value::Null),
            None => Value::String(format!("{:?}", other)),
        },
    }
}

fn float_to_json(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        return Value::from(f as i64);
    }
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

#[allow(unreachable_patterns)]
fn key_to_string(key: &Key) -> String {
    match key {
        Key::String(s) => s.to_string(),
        Key::Int(i) => i.to_string(),
        Key::Uint(u) => u.to_string(),
        Key::Bool(b) => b.to_string(),
        other => format!("{:?}", other),
    }
}
