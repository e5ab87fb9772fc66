// ── Subscription router ──
//
// The fixed subscription set issued on every connect, and the dispatch of
// inbound MESSAGE frames to the domain caches or the RPC correlator.
// Payloads come in three shapes (`{field: [...]}`, `[...]`, `{...}`);
// `normalize` flattens them into one item list before merging.

use std::sync::Arc;

use serde_json::Value;
use vigil_api::Frame;

use crate::model::{Digest, NewsItem, Record, RecordId, SensorPolicy};
use crate::rpc::RpcCorrelator;
use crate::store::{DomainCaches, MergeCache};

/// Topic names the gateway broadcasts on.
pub mod topics {
    pub const INCIDENTS: &str = "/topic/incidents";
    pub const NEWS: &str = "/topic/news";
    pub const SENSORS: &str = "/topic/sensors";
    pub const ALL: &str = "/topic/all";
    pub const SENSORS_CREATED: &str = "/topic/sensors/created";
    pub const SENSOR_STATUS: &str = "/topic/sensors/status";
    pub const SENSOR_POLICY: &str = "/topic/sensors/policy";
    pub const CAMERA_STATUS: &str = "/topic/cameras/status";
    pub const CAMERA_ALERTS: &str = "/topic/camera-alerts";
}

/// What a subscription's frames are handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Route {
    Incidents,
    News,
    Sensors,
    SensorStatus,
    SensorPolicy,
    Cameras,
    CameraAlerts,
    /// `/topic/all`: shape-sniffed.
    Aggregate,
    /// Reply queue: resolves pending requests.
    Reply,
    /// Error queue: rejects pending requests.
    ErrorReply,
}

impl Route {
    /// Array field a payload for this route may wrap its items in.
    fn field(self) -> Option<&'static str> {
        match self {
            Self::Incidents => Some("incidents"),
            Self::News => Some("news"),
            Self::Sensors => Some("sensors"),
            Self::Cameras => Some("cameras"),
            Self::CameraAlerts => Some("alerts"),
            Self::SensorStatus
            | Self::SensorPolicy
            | Self::Aggregate
            | Self::Reply
            | Self::ErrorReply => None,
        }
    }
}

/// One SUBSCRIBE issued on connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub destination: String,
    pub route: Route,
}

/// Named fields recognized on the aggregated topic.
const AGGREGATE_FIELDS: [(&str, Route); 4] = [
    ("incidents", Route::Incidents),
    ("news", Route::News),
    ("sensors", Route::Sensors),
    ("cameras", Route::Cameras),
];

/// Routes inbound frames to caches and the correlator.
pub struct SubscriptionRouter {
    caches: Arc<DomainCaches>,
    correlator: Arc<RpcCorrelator>,
    subscriptions: Vec<Subscription>,
}

impl SubscriptionRouter {
    /// Build the subscription table. Replies go to `correlator.reply_to()`,
    /// request failures to `error_queue`.
    pub fn new(caches: Arc<DomainCaches>, correlator: Arc<RpcCorrelator>, error_queue: &str) -> Self {
        let table = [
            (topics::INCIDENTS, Route::Incidents),
            (topics::NEWS, Route::News),
            (topics::SENSORS, Route::Sensors),
            (topics::ALL, Route::Aggregate),
            (correlator.reply_to(), Route::Reply),
            (error_queue, Route::ErrorReply),
            (topics::SENSORS_CREATED, Route::Sensors),
            (topics::SENSOR_STATUS, Route::SensorStatus),
            (topics::SENSOR_POLICY, Route::SensorPolicy),
            (topics::CAMERA_STATUS, Route::Cameras),
            (topics::CAMERA_ALERTS, Route::CameraAlerts),
        ];
        let subscriptions = table
            .iter()
            .enumerate()
            .map(|(n, (destination, route))| Subscription {
                id: format!("sub-{n}"),
                destination: (*destination).to_owned(),
                route: *route,
            })
            .collect();

        Self {
            caches,
            correlator,
            subscriptions,
        }
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn caches(&self) -> &Arc<DomainCaches> {
        &self.caches
    }

    /// Handle one MESSAGE frame. Returns the route taken, or `None` if the
    /// frame belongs to no subscription of ours.
    pub fn route_frame(&self, frame: &Frame) -> Option<Route> {
        let route = self.lookup(frame)?;
        match route {
            Route::Reply => {
                self.correlator.resolve(frame);
            }
            Route::ErrorReply => {
                self.correlator.reject(frame);
            }
            _ => match serde_json::from_str::<Value>(&frame.body) {
                Ok(payload) => self.dispatch(route, payload),
                Err(e) => {
                    tracing::warn!(
                        destination = frame.destination().unwrap_or("?"),
                        error = %e,
                        "malformed payload dropped"
                    );
                }
            },
        }
        Some(route)
    }

    /// Apply a parsed payload for a domain route.
    pub fn dispatch(&self, route: Route, payload: Value) {
        match route {
            Route::Aggregate => {
                let groups = sniff(payload);
                if groups.is_empty() {
                    tracing::trace!("unrecognized aggregate payload dropped");
                }
                for (route, items) in groups {
                    self.apply(route, items);
                }
            }
            Route::SensorStatus => self.apply_status(payload),
            Route::SensorPolicy => self.apply_policy(&payload),
            Route::Reply | Route::ErrorReply => {
                tracing::debug!(route = %route, "reply payload not routable to a domain");
            }
            _ => {
                let items = match route.field() {
                    Some(field) => normalize(payload, field),
                    None => vec![payload],
                };
                self.apply(route, items);
            }
        }
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn lookup(&self, frame: &Frame) -> Option<Route> {
        if let Some(id) = frame.get("subscription") {
            if let Some(sub) = self.subscriptions.iter().find(|s| s.id == id) {
                return Some(sub.route);
            }
        }
        let destination = frame.destination()?;
        self.subscriptions
            .iter()
            .find(|s| s.destination == destination)
            .map(|s| s.route)
    }

    fn apply(&self, route: Route, items: Vec<Value>) {
        if items.is_empty() {
            return;
        }
        let caches = &self.caches;
        match route {
            Route::Incidents => merge_into(caches.incidents(), items),
            Route::Sensors => merge_into(caches.sensors(), items),
            Route::Cameras => merge_into(caches.cameras(), items),
            Route::CameraAlerts => merge_into(caches.camera_alerts(), items),
            Route::News => {
                let news: Vec<NewsItem> = decode(items);
                let digests: Vec<Digest> = news
                    .iter()
                    .filter(|item| item.is_ai())
                    .filter_map(|item| {
                        serde_json::to_value(item)
                            .and_then(serde_json::from_value)
                            .ok()
                    })
                    .collect();
                report(caches.news(), news);
                report(caches.digests(), digests);
            }
            Route::SensorStatus
            | Route::SensorPolicy
            | Route::Aggregate
            | Route::Reply
            | Route::ErrorReply => {
                tracing::debug!(route = %route, "not a merge route");
            }
        }
    }

    fn apply_status(&self, payload: Value) {
        for status in normalize(payload, "statuses") {
            let Some(key) = sensor_key(&status, "sensorId") else {
                tracing::debug!("sensor status without sensorId dropped");
                continue;
            };
            let updated = self
                .caches
                .sensors()
                .update(&key, |sensor| sensor.last_status = Some(status.clone()));
            if !updated {
                tracing::trace!(sensor = %key, "status for unknown sensor ignored");
            }
        }
    }

    fn apply_policy(&self, payload: &Value) {
        if sensor_key(payload, "sensorId").is_none() {
            tracing::debug!("policy broadcast without sensorId dropped");
            return;
        }
        if let Some(policy) = SensorPolicy::normalize(payload) {
            if let Some(key) = policy.key() {
                tracing::debug!(sensor = %key, "sensor policy updated from broadcast");
                self.caches.sensor_policies().insert(key, policy);
            }
        }
    }
}

/// Flatten a payload into items: the named array field, the payload itself
/// if it is an array, else the payload as a single item.
pub fn normalize(payload: Value, field: &str) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        Value::Object(mut map) => match map.remove(field) {
            Some(Value::Array(items)) => items,
            Some(other) => {
                map.insert(field.to_owned(), other);
                vec![Value::Object(map)]
            }
            None => vec![Value::Object(map)],
        },
        other => vec![other],
    }
}

/// Split an aggregated payload into per-domain item lists.
///
/// Named array fields win; every one present is dispatched. Otherwise the
/// first element decides where the whole list goes.
pub fn sniff(payload: Value) -> Vec<(Route, Vec<Value>)> {
    let items = match payload {
        Value::Object(mut map) => {
            if AGGREGATE_FIELDS
                .iter()
                .any(|(field, _)| map.get(*field).is_some_and(Value::is_array))
            {
                return AGGREGATE_FIELDS
                    .iter()
                    .filter_map(|(field, route)| match map.remove(*field) {
                        Some(Value::Array(items)) => Some((*route, items)),
                        _ => None,
                    })
                    .collect();
            }
            vec![Value::Object(map)]
        }
        Value::Array(items) => items,
        _ => return Vec::new(),
    };

    match items.first().and_then(classify) {
        Some(route) => vec![(route, items)],
        None => Vec::new(),
    }
}

fn classify(item: &Value) -> Option<Route> {
    let has = |field: &str| item.get(field).is_some();
    if has("severity") || has("kind") || has("level") {
        Some(Route::Incidents)
    } else if has("title") || has("body") || has("message") {
        Some(Route::News)
    } else if has("sensorId") {
        Some(Route::Sensors)
    } else {
        None
    }
}

fn sensor_key(payload: &Value, field: &str) -> Option<String> {
    RecordId::from_json(payload.get(field)?).map(|id| id.to_string())
}

pub(crate) fn decode<T: Record>(items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(kind = T::KIND, error = %e, "undecodable item dropped");
                None
            }
        })
        .collect()
}

fn merge_into<T: Record>(cache: &MergeCache<T>, items: Vec<Value>) {
    report(cache, decode(items));
}

fn report<T: Record>(cache: &MergeCache<T>, records: Vec<T>) {
    if records.is_empty() {
        return;
    }
    let stats = cache.merge(records);
    tracing::debug!(
        kind = T::KIND,
        added = stats.added,
        updated = stats.updated,
        dropped = stats.dropped,
        "merged"
    );
}
