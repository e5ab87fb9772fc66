// ── Typed request structs for admin actions ──
//
// Each action takes one of these instead of raw JSON. `body()` produces
// the JSON sent both as the RPC payload and as the HTTP body, so the two
// paths can never disagree on what was asked for.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::CoreError;
use crate::model::RecordId;

fn to_body<T: Serialize>(value: &T) -> Result<Value, CoreError> {
    serde_json::to_value(value).map_err(|e| CoreError::Internal(format!("request encoding: {e}")))
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// `{ts: <epoch ms>}`, the body of the fire-and-report triggers.
pub(crate) fn timestamp_body() -> Value {
    json!({ "ts": now_millis() })
}

// ── Sensors ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSensorRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    /// Free-form metadata; the gateway stores it as a JSON string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegisterSensorRequest {
    /// Request body with `meta` flattened to a string (`"{}"` when absent).
    pub fn body(&self) -> Result<Value, CoreError> {
        let meta = match &self.meta {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "{}".to_owned(),
        };
        let mut body = to_body(self)?;
        if let Value::Object(map) = &mut body {
            map.insert("meta".into(), Value::String(meta));
        }
        Ok(body)
    }
}

/// Threshold changes for one sensor. Absent fields are sent as `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorPolicyUpdate {
    pub mode: Option<String>,
    pub alert_above: Option<f64>,
    pub warn_above: Option<f64>,
    pub clear_below: Option<f64>,
    pub ttl_sec: Option<i64>,
}

impl SensorPolicyUpdate {
    pub fn body(&self, sensor_id: &RecordId) -> Result<Value, CoreError> {
        let mut body = to_body(self)?;
        if let Value::Object(map) = &mut body {
            map.insert("sensorId".into(), sensor_id.clone().into());
        }
        Ok(body)
    }
}

// ── Cameras ────────────────────────────────────────────────────────

/// Analytics policy changes for one camera. Absent fields are sent as `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPolicyUpdate {
    pub enabled: bool,
    pub mode: Option<String>,
    pub interval_sec: Option<i64>,
    pub ok_regex: Option<String>,
    pub hit_regex: Option<String>,
    pub incident_kind: Option<String>,
    pub incident_level: Option<String>,
    pub ttl_sec: Option<i64>,
}

impl CameraPolicyUpdate {
    pub fn body(&self, camera_id: &RecordId) -> Result<Value, CoreError> {
        let mut body = to_body(self)?;
        if let Value::Object(map) = &mut body {
            map.insert("cameraId".into(), camera_id.clone().into());
        }
        Ok(body)
    }
}

/// Run detection on a camera snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectRequest {
    pub id: Option<RecordId>,
    pub external_id: Option<String>,
    pub snapshot_url: Option<String>,
    pub create_incident: bool,
}

impl Default for DetectRequest {
    fn default() -> Self {
        Self {
            id: None,
            external_id: None,
            snapshot_url: None,
            create_incident: true,
        }
    }
}

impl DetectRequest {
    pub fn body(&self) -> Result<Value, CoreError> {
        to_body(self)
    }

    /// The same fields as HTTP query parameters; absent ones are omitted.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = &self.id {
            pairs.push(("id".to_owned(), id.to_string()));
        }
        if let Some(external_id) = &self.external_id {
            pairs.push(("externalId".to_owned(), external_id.clone()));
        }
        if let Some(url) = &self.snapshot_url {
            pairs.push(("snapshotUrl".to_owned(), url.clone()));
        }
        pairs.push(("createIncident".to_owned(), self.create_incident.to_string()));
        pairs
    }
}

// ── Incidents ──────────────────────────────────────────────────────

/// Operator-reported incident.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    /// Epoch milliseconds; stamped with the current time when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IncidentReport {
    pub fn body(&self) -> Result<Value, CoreError> {
        let mut report = self.clone();
        report.ts.get_or_insert_with(now_millis);
        to_body(&report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn register_meta_is_stringified() {
        let request = RegisterSensorRequest {
            name: Some("t-1".into()),
            meta: Some(json!({"floor": 2})),
            ..RegisterSensorRequest::default()
        };
        let body = request.body().unwrap();
        assert_eq!(body["meta"], "{\"floor\":2}");
        assert_eq!(body["name"], "t-1");

        let plain = RegisterSensorRequest {
            meta: Some(json!("raw")),
            ..RegisterSensorRequest::default()
        };
        assert_eq!(plain.body().unwrap()["meta"], "raw");
        assert_eq!(RegisterSensorRequest::default().body().unwrap()["meta"], "{}");
    }

    #[test]
    fn policy_update_sends_nulls_and_id() {
        let update = SensorPolicyUpdate {
            alert_above: Some(80.0),
            ..SensorPolicyUpdate::default()
        };
        let body = update.body(&RecordId::Number(3)).unwrap();
        assert_eq!(
            body,
            json!({
                "sensorId": 3, "mode": null, "alertAbove": 80.0,
                "warnAbove": null, "clearBelow": null, "ttlSec": null
            })
        );
    }

    #[test]
    fn camera_policy_update_body() {
        let update = CameraPolicyUpdate {
            enabled: true,
            interval_sec: Some(30),
            ..CameraPolicyUpdate::default()
        };
        let body = update.body(&RecordId::Text("cam-9".into())).unwrap();
        assert_eq!(body["cameraId"], "cam-9");
        assert_eq!(body["enabled"], true);
        assert_eq!(body["intervalSec"], 30);
        assert!(body["hitRegex"].is_null());
    }

    #[test]
    fn detect_body_and_query_agree() {
        let request = DetectRequest {
            id: Some(RecordId::Number(4)),
            snapshot_url: Some("http://cam/4.jpg".into()),
            ..DetectRequest::default()
        };
        let body = request.body().unwrap();
        assert_eq!(body["createIncident"], true);
        assert_eq!(body["externalId"], Value::Null);
        assert_eq!(
            request.query_pairs(),
            vec![
                ("id".to_owned(), "4".to_owned()),
                ("snapshotUrl".to_owned(), "http://cam/4.jpg".to_owned()),
                ("createIncident".to_owned(), "true".to_owned()),
            ]
        );
    }

    #[test]
    fn incident_report_is_stamped() {
        let body = IncidentReport {
            kind: Some("FIRE".into()),
            ..IncidentReport::default()
        }
        .body()
        .unwrap();
        assert!(body["ts"].as_i64().unwrap() > 0);

        let fixed = IncidentReport {
            ts: Some(42),
            ..IncidentReport::default()
        };
        assert_eq!(fixed.body().unwrap()["ts"], 42);
    }
}
