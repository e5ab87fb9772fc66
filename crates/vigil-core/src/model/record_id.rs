// ── Record identity ──
//
// Gateways hand out numeric database ids for most records and opaque
// strings for externally sourced ones. RecordId accepts both.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Identifier of a sensor, camera, or feed item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl RecordId {
    /// Read an id from any JSON scalar.
    ///
    /// Integers (including integral floats like `3.0`) become `Number`;
    /// numbers outside `i64` or with a fraction keep their text form.
    /// `null`, booleans, arrays and objects are not ids.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                let text = n.to_string();
                let integral = text.strip_suffix(".0").unwrap_or(&text);
                Some(
                    integral
                        .parse::<i64>()
                        .map_or_else(|_| Self::Text(text.clone()), Self::Number),
                )
            }
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// `true` if `value` names this id (number or string form).
    pub fn matches(&self, value: &Value) -> bool {
        Self::from_json(value).as_ref() == Some(self)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(de)?;
        Self::from_json(&value)
            .ok_or_else(|| de::Error::custom(format!("expected a number or string id, got {value}")))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl FromStr for RecordId {
    type Err = std::convert::Infallible;

    /// Digits become `Number`, anything else stays `Text`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<i64>().map_or_else(|_| Self::Text(s.to_owned()), Self::Number))
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<RecordId> for Value {
    fn from(id: RecordId) -> Self {
        match id {
            RecordId::Number(n) => n.into(),
            RecordId::Text(s) => s.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn deserializes_numbers_and_strings() {
        let n: RecordId = serde_json::from_value(json!(17)).unwrap();
        let s: RecordId = serde_json::from_value(json!("cam-3")).unwrap();
        assert_eq!(n, RecordId::Number(17));
        assert_eq!(s, RecordId::Text("cam-3".into()));
        assert_eq!(n.to_string(), "17");
    }

    #[test]
    fn parse_prefers_numbers() {
        assert_eq!("42".parse::<RecordId>().unwrap(), RecordId::Number(42));
        assert_eq!("x42".parse::<RecordId>().unwrap(), RecordId::Text("x42".into()));
    }

    #[test]
    fn integral_floats_and_wide_numbers() {
        let float: RecordId = serde_json::from_value(json!(3.0)).unwrap();
        let wide: RecordId = serde_json::from_value(json!(u64::MAX)).unwrap();
        let fraction: RecordId = serde_json::from_value(json!(2.5)).unwrap();
        assert_eq!(float, RecordId::Number(3));
        assert_eq!(wide, RecordId::Text(u64::MAX.to_string()));
        assert_eq!(fraction.to_string(), "2.5");
        assert!(serde_json::from_value::<RecordId>(json!(true)).is_err());
        assert_eq!(RecordId::from_json(&Value::Null), None);
    }

    #[test]
    fn matches_same_json_type_only() {
        let id = RecordId::Number(5);
        assert!(id.matches(&json!(5)));
        assert!(!id.matches(&json!("5")));
        assert!(RecordId::from("a").matches(&json!("a")));
    }
}
