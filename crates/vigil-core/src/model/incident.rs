use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Record, RecordId, composite, id_text, lenient, number_text, scalar_text};

/// An incident on the live map (`/topic/incidents`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    #[serde(default, deserialize_with = "lenient::id", skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient::id", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Value>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for Incident {
    const KIND: &'static str = "incident";

    /// `id`, else `externalId`, else `kind|lat|lng|ts`.
    ///
    /// The composite is a heuristic: two reports of the same kind at the
    /// same place and millisecond collapse into one.
    fn identity(&self) -> Option<String> {
        id_text(self.id.as_ref())
            .or_else(|| id_text(self.external_id.as_ref()))
            .or_else(|| {
                composite([
                    self.kind.clone(),
                    number_text(self.lat),
                    number_text(self.lng),
                    scalar_text(self.ts.as_ref()),
                ])
            })
    }
}
