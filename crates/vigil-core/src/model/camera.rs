use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Record, RecordId, id_text, lenient};

/// A camera with its latest status, from `/topic/cameras/status` or
/// `/api/public/cameras/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    #[serde(default, deserialize_with = "lenient::id", skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient::id", skip_serializing_if = "Option::is_none")]
    pub camera_id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient::id", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag", skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub snapshot_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for Camera {
    const KIND: &'static str = "camera";

    fn identity(&self) -> Option<String> {
        id_text(self.id.as_ref())
            .or_else(|| id_text(self.camera_id.as_ref()))
            .or_else(|| id_text(self.external_id.as_ref()))
    }
}
