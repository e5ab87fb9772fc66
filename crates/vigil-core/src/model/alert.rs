use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Record, RecordId, composite, id_text, lenient, scalar_text};

/// A detection raised by camera analytics (`/topic/camera-alerts`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraAlert {
    #[serde(default, deserialize_with = "lenient::id", skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient::id", skip_serializing_if = "Option::is_none")]
    pub camera_id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Value>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for CameraAlert {
    const KIND: &'static str = "camera-alert";

    fn identity(&self) -> Option<String> {
        id_text(self.id.as_ref()).or_else(|| {
            composite([
                id_text(self.camera_id.as_ref()),
                scalar_text(self.ts.as_ref()),
            ])
        })
    }
}
