use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Record, RecordId, id_text, lenient};

/// A telemetry sensor as published on `/topic/sensors*` and `/api/public/sensors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    #[serde(default, deserialize_with = "lenient::id", skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient::id", skip_serializing_if = "Option::is_none")]
    pub sensor_id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient::id", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    /// Last payload seen on `/topic/sensors/status` for this sensor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for Sensor {
    const KIND: &'static str = "sensor";

    fn identity(&self) -> Option<String> {
        id_text(self.id.as_ref())
            .or_else(|| id_text(self.sensor_id.as_ref()))
            .or_else(|| id_text(self.external_id.as_ref()))
    }
}
