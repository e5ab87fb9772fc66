// ── Alerting policies ──
//
// Policies come back from RPC replies, HTTP responses and the
// `/topic/sensors/policy` broadcast in slightly different shapes.
// `normalize` turns any of them into one typed value with defaults filled
// in; fields it does not know are carried along in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{RecordId, lenient_f64, lenient_i64};

/// Threshold policy for one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorPolicy {
    pub sensor_id: Option<RecordId>,
    pub mode: String,
    pub alert_above: Option<f64>,
    pub warn_above: Option<f64>,
    pub clear_below: Option<f64>,
    pub ttl_sec: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SensorPolicy {
    /// Normalize a raw policy payload. Anything but a JSON object is `None`.
    pub fn normalize(raw: &Value) -> Option<Self> {
        let mut map = raw.as_object()?.clone();
        let sensor_id = take_id(&mut map, "sensorId").or_else(|| peek_id(&map, "id"));
        let mode = take_string(&mut map, "mode").unwrap_or_else(|| "AUTO".into());
        Some(Self {
            sensor_id,
            mode,
            alert_above: lenient_f64(map.remove("alertAbove").as_ref()),
            warn_above: lenient_f64(map.remove("warnAbove").as_ref()),
            clear_below: lenient_f64(map.remove("clearBelow").as_ref()),
            ttl_sec: lenient_i64(map.remove("ttlSec").as_ref()),
            extra: map,
        })
    }

    pub fn key(&self) -> Option<String> {
        self.sensor_id.as_ref().map(ToString::to_string)
    }
}

/// Analytics policy for one camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPolicy {
    pub camera_id: Option<RecordId>,
    pub enabled: bool,
    pub mode: String,
    pub interval_sec: i64,
    pub ok_regex: String,
    pub hit_regex: String,
    pub incident_kind: String,
    pub incident_level: String,
    pub ttl_sec: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CameraPolicy {
    /// Normalize a raw policy payload. Anything but a JSON object is `None`.
    pub fn normalize(raw: &Value) -> Option<Self> {
        let mut map = raw.as_object()?.clone();
        let camera_id = take_id(&mut map, "cameraId").or_else(|| peek_id(&map, "id"));
        Some(Self {
            camera_id,
            enabled: map.remove("enabled").as_ref().is_some_and(truthy),
            mode: take_string(&mut map, "mode").unwrap_or_else(|| "AUTO".into()),
            interval_sec: lenient_i64(map.remove("intervalSec").as_ref()).unwrap_or(60),
            ok_regex: take_string(&mut map, "okRegex").unwrap_or_default(),
            hit_regex: take_string(&mut map, "hitRegex").unwrap_or_default(),
            incident_kind: take_string(&mut map, "incidentKind").unwrap_or_else(|| "FIRE".into()),
            incident_level: take_string(&mut map, "incidentLevel").unwrap_or_else(|| "HIGH".into()),
            ttl_sec: lenient_i64(map.remove("ttlSec").as_ref()).unwrap_or(900),
            extra: map,
        })
    }

    pub fn key(&self) -> Option<String> {
        self.camera_id.as_ref().map(ToString::to_string)
    }
}

fn take_id(map: &mut Map<String, Value>, key: &str) -> Option<RecordId> {
    let value = map.remove(key)?;
    serde_json::from_value(value).ok()
}

fn peek_id(map: &Map<String, Value>, key: &str) -> Option<RecordId> {
    serde_json::from_value(map.get(key)?.clone()).ok()
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
