use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Record, RecordId, id_text, lenient, scalar_text};

/// A news feed entry (`/topic/news`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    #[serde(default, deserialize_with = "lenient::id", skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NewsItem {
    /// Entries produced by the AI digest job.
    pub fn is_ai(&self) -> bool {
        self.source
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("AI"))
    }
}

impl Record for NewsItem {
    const KIND: &'static str = "news";

    /// `id`, else `ts`, else `title`, else the record's canonical JSON.
    fn identity(&self) -> Option<String> {
        id_text(self.id.as_ref())
            .or_else(|| scalar_text(self.ts.as_ref()))
            .or_else(|| self.title.clone().filter(|t| !t.is_empty()))
            .or_else(|| {
                serde_json::to_string(self)
                    .ok()
                    .filter(|json| json != "{}")
            })
    }
}
