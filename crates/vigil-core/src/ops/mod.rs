// ── Domain operations ──
//
// The console's admin actions and initial loads, as methods on `Session`.
// Actions go through the dual-path policy; loads are plain public HTTP
// whose results are merged into the caches.

mod cameras;
mod digests;
mod incidents;
mod requests;
mod sensors;

pub use requests::{
    CameraPolicyUpdate, DetectRequest, IncidentReport, RegisterSensorRequest, SensorPolicyUpdate,
};

use serde_json::Value;

use crate::model::Record;
use crate::router::{decode, normalize};
use crate::session::Session;
use crate::store::{MergeCache, MergeStats};

impl Session {
    /// Fill the sensor, camera and digest caches from the public API.
    ///
    /// Failures are logged and otherwise ignored; the live topics fill in
    /// whatever a failed load missed.
    pub async fn load_initial(&self) {
        let (sensors, cameras, digests) =
            tokio::join!(self.load_sensors(), self.load_cameras(), self.load_digests(0, 50));

        for (what, result) in [("sensors", sensors), ("cameras", cameras), ("digests", digests)] {
            match result {
                Ok(stats) => tracing::info!(what, added = stats.added, "initial load"),
                Err(e) => tracing::warn!(what, error = %e, "initial load failed"),
            }
        }
    }
}

/// Items of a list response: a paged `content` array, the named field,
/// a bare array, or a single object.
fn page_items(payload: Value, field: &str) -> Vec<Value> {
    match payload {
        Value::Object(mut map) if map.get("content").is_some_and(Value::is_array) => {
            match map.remove("content") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            }
        }
        other => normalize(other, field),
    }
}

fn merge_loaded<T: Record>(cache: &MergeCache<T>, payload: Value, field: &str) -> MergeStats {
    let records: Vec<T> = decode(page_items(payload, field));
    cache.merge(records)
}

fn replace_loaded<T: Record>(cache: &MergeCache<T>, payload: Value, field: &str) -> MergeStats {
    let records: Vec<T> = decode(page_items(payload, field));
    cache.replace(records)
}
