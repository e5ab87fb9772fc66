use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Record, RecordId, composite, id_text, lenient, scalar_text};

/// An AI digest entry: a news item with `source = AI`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Digest {
    #[serde(default, deserialize_with = "lenient::id", skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient::id", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for Digest {
    const KIND: &'static str = "digest";

    /// `id`, else `externalId`, else `source|title|ts` (`timestamp` stands in for `ts`).
    fn identity(&self) -> Option<String> {
        id_text(self.id.as_ref())
            .or_else(|| id_text(self.external_id.as_ref()))
            .or_else(|| {
                composite([
                    self.source.clone(),
                    self.title.clone(),
                    scalar_text(self.ts.as_ref()).or_else(|| scalar_text(self.timestamp.as_ref())),
                ])
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn timestamp_stands_in_for_ts() {
        let d: Digest =
            serde_json::from_value(json!({"source": "AI", "title": "Daily", "timestamp": "2024-05-01"}))
                .unwrap();
        assert_eq!(d.identity().as_deref(), Some("AI|Daily|2024-05-01"));
    }
}
