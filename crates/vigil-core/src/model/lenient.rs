// ── Lenient field decoding ──
//
// Gateways are loose about scalar types: coordinates arrive as strings,
// names as numbers, flags as "true". These `deserialize_with` helpers
// never fail on a well-formed JSON value; a value that cannot be read as
// the field's type decodes as `None` instead of rejecting the record.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::{RecordId, lenient_f64};

pub(crate) fn id<'de, D: Deserializer<'de>>(de: D) -> Result<Option<RecordId>, D::Error> {
    Ok(RecordId::from_json(&Value::deserialize(de)?))
}

pub(crate) fn text<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}

pub(crate) fn number<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    Ok(lenient_f64(Some(&Value::deserialize(de)?)))
}

pub(crate) fn flag<'de, D: Deserializer<'de>>(de: D) -> Result<Option<bool>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Bool(b) => Some(b),
        Value::Number(n) => n.as_f64().map(|f| f.abs() > 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}
