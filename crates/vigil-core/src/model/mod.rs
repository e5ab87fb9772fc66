// ── Domain model ──
//
// Records arrive as loosely-shaped JSON. Each type names the fields the
// console relies on and keeps everything else in a flattened `extra` map,
// so a record written back to the gateway loses nothing.

mod alert;
mod camera;
mod digest;
mod incident;
pub(crate) mod lenient;
mod news;
mod policy;
mod record_id;
mod sensor;

pub use alert::CameraAlert;
pub use camera::Camera;
pub use digest::Digest;
pub use incident::Incident;
pub use news::NewsItem;
pub use policy::{CameraPolicy, SensorPolicy};
pub use record_id::RecordId;
pub use sensor::Sensor;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A domain record that can live in a merge cache.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Short domain name used in logs.
    const KIND: &'static str;

    /// Stable identity key, or `None` if the record cannot be identified.
    fn identity(&self) -> Option<String>;
}

/// Shallow merge: non-null fields in `incoming` overwrite, absent and
/// `null` ones keep the existing value.
///
/// Works on the JSON form so the flattened `extra` fields merge the same
/// way as the typed ones.
pub(crate) fn shallow_merge<T: Record>(existing: &T, incoming: T) -> T {
    let (Ok(Value::Object(mut base)), Ok(Value::Object(patch))) =
        (serde_json::to_value(existing), serde_json::to_value(&incoming))
    else {
        return incoming;
    };
    base.extend(patch.into_iter().filter(|(_, value)| !value.is_null()));
    match serde_json::from_value(Value::Object(base)) {
        Ok(merged) => merged,
        Err(e) => {
            tracing::debug!(kind = T::KIND, error = %e, "merged record did not round-trip; keeping incoming");
            incoming
        }
    }
}

// ── Identity helpers ────────────────────────────────────────────────

pub(crate) fn id_text(id: Option<&RecordId>) -> Option<String> {
    id.map(ToString::to_string).filter(|s| !s.is_empty())
}

/// Text form of a scalar JSON value; `null` and missing are `None`.
pub(crate) fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn number_text(value: Option<f64>) -> Option<String> {
    value.map(|v| v.to_string())
}

/// `a|b|c` with missing parts left empty, or `None` if every part is missing.
pub(crate) fn composite<const N: usize>(parts: [Option<String>; N]) -> Option<String> {
    if parts.iter().all(Option::is_none) {
        return None;
    }
    Some(
        parts
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect::<Vec<_>>()
            .join("|"),
    )
}

/// Number, or a string that parses as one. Non-finite values are `None`.
pub(crate) fn lenient_f64(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Integer, or a string with a leading integer (`"15s"` → 15).
pub(crate) fn lenient_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc())
                .and_then(|f| format!("{f:.0}").parse().ok())
        }),
        Value::String(s) => {
            let s = s.trim_start();
            let end = s
                .char_indices()
                .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
                .map_or(s.len(), |(i, _)| i);
            s.get(..end)?.parse().ok()
        }
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn composite_requires_one_component() {
        assert_eq!(composite([None, None, None]), None);
        assert_eq!(
            composite([Some("FIRE".into()), None, Some("7".into())]).as_deref(),
            Some("FIRE||7")
        );
    }

    #[test]
    fn scalar_text_renders_numbers_plainly() {
        assert_eq!(scalar_text(Some(&json!(1_700_000_000_000_i64))).as_deref(), Some("1700000000000"));
        assert_eq!(scalar_text(Some(&json!("t"))).as_deref(), Some("t"));
        assert_eq!(scalar_text(Some(&Value::Null)), None);
        assert_eq!(number_text(Some(55.0)).as_deref(), Some("55"));
        assert_eq!(number_text(Some(37.61)).as_deref(), Some("37.61"));
    }

    #[test]
    fn merge_ignores_explicit_nulls() {
        let existing: Sensor =
            serde_json::from_value(json!({"id": 1, "name": "a", "note": "kept"})).unwrap();
        let incoming: Sensor =
            serde_json::from_value(json!({"id": 1, "name": null, "note": null, "unit": "C"})).unwrap();
        let merged = shallow_merge(&existing, incoming);
        assert_eq!(merged.name.as_deref(), Some("a"));
        assert_eq!(merged.extra["note"], "kept");
        assert_eq!(merged.extra["unit"], "C");
    }

    #[test]
    fn lenient_numbers() {
        assert_eq!(lenient_f64(Some(&json!("12.5"))), Some(12.5));
        assert_eq!(lenient_f64(Some(&json!("abc"))), None);
        assert_eq!(lenient_f64(Some(&json!(true))), None);
        assert_eq!(lenient_f64(Some(&json!("inf"))), None);
        assert_eq!(lenient_i64(Some(&json!("15s"))), Some(15));
        assert_eq!(lenient_i64(Some(&json!(-3))), Some(-3));
        assert_eq!(lenient_i64(Some(&json!(9.8))), Some(9));
        assert_eq!(lenient_i64(Some(&json!("x1"))), None);
        assert_eq!(lenient_i64(None), None);
    }
}
