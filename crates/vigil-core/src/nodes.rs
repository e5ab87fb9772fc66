// ── Cluster node health ──
//
// Watches every routing node behind a gateway independently of the
// operator session: the public ping and peer-health endpoints are polled
// on fixed intervals, and the node's public event stream marks it alive
// whenever a PING goes by. State lives in one map keyed by node id and is
// published as a sorted snapshot on every change.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;
use vigil_api::{Endpoint, HttpClient, HttpRequest, Method, SseEvent, TransportConfig};

use crate::config::SessionConfig;
use crate::error::CoreError;
use crate::model::lenient;

/// Nodes watched when none are configured.
pub const DEFAULT_NODES: [&str; 3] = ["node-a", "node-b", "node-c"];
/// A node whose last ping is older than this reports `DOWN`.
pub const PING_TTL: Duration = Duration::from_secs(45);

const PING_PATH: &str = "/ping";
const PEERS_PATH: &str = "/peers/health";
const EVENTS_PATH: &str = "/events";

/// Payload fields that may carry an event's type.
const EVENT_TAGS: [&str; 4] = ["type", "kind", "event", "name"];

// ── NodeHealth ───────────────────────────────────────────────────

/// Summary status of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum NodeStatus {
    Ok,
    Down,
}

/// Everything known about one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeHealth {
    pub node_id: String,
    /// `status` from the last ping, `DOWN` after a failed one.
    pub public_status: Option<String>,
    pub ip: Option<String>,
    pub region_code: Option<String>,
    pub peers: Vec<Value>,
    pub peer_health: Vec<Value>,
    pub last_ping: Option<DateTime<Utc>>,
    /// `None` until the first poll answers or fails.
    pub online: Option<bool>,
    pub sse_connected: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PingReply {
    #[serde(default, deserialize_with = "lenient::text")]
    status: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    ip: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    region_code: Option<String>,
    #[serde(default)]
    peers: Option<Value>,
}

impl NodeHealth {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            public_status: None,
            ip: None,
            region_code: None,
            peers: Vec::new(),
            peer_health: Vec::new(),
            last_ping: None,
            online: None,
            sse_connected: false,
            error: None,
        }
    }

    /// `OK` while the last ping is younger than [`PING_TTL`].
    pub fn status_at(&self, now: DateTime<Utc>) -> NodeStatus {
        let alive = self
            .last_ping
            .and_then(|at| (now - at).to_std().ok())
            .is_some_and(|age| age < PING_TTL);
        if alive { NodeStatus::Ok } else { NodeStatus::Down }
    }

    pub fn status(&self) -> NodeStatus {
        self.status_at(Utc::now())
    }

    /// Apply a successful ping. Fields the reply leaves out keep their
    /// previous values.
    fn ping_ok(&mut self, body: Value, now: DateTime<Utc>) {
        let reply: PingReply = serde_json::from_value(body).unwrap_or_default();
        self.public_status = reply.status.filter(|s| !s.is_empty());
        if reply.ip.is_some() {
            self.ip = reply.ip;
        }
        if reply.region_code.is_some() {
            self.region_code = reply.region_code;
        }
        if let Some(Value::Array(peers)) = reply.peers {
            self.peers = peers;
        }
        self.last_ping = Some(now);
        self.online = Some(true);
        self.error = None;
    }

    fn ping_failed(&mut self, error: String) {
        self.public_status = Some("DOWN".into());
        self.online = Some(false);
        self.error = Some(error);
    }

    fn peers_ok(&mut self, body: Value) {
        self.peer_health = match body {
            Value::Array(items) => items,
            _ => Vec::new(),
        };
        self.online = Some(true);
    }

    fn peers_failed(&mut self, error: String) {
        self.peer_health.clear();
        self.online = Some(false);
        self.error = Some(error);
    }

    fn stream_opened(&mut self) {
        self.sse_connected = true;
        self.online = Some(true);
    }

    fn heard_ping(&mut self, now: DateTime<Utc>) {
        self.last_ping = Some(now);
        self.online = Some(true);
    }
}

/// Whether an event announces a heartbeat: its JSON payload's type tag,
/// or failing that its event name, contains `PING` in any case.
fn is_ping(event: &SseEvent) -> bool {
    let payload: Option<Value> = serde_json::from_str(&event.data).ok();
    let tag = payload.as_ref().and_then(|p| {
        EVENT_TAGS
            .iter()
            .find_map(|key| p.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()))
    });
    tag.unwrap_or(event.kind()).to_ascii_uppercase().contains("PING")
}

// ── NodeWatcherConfig ────────────────────────────────────────────

/// Which nodes to watch, and how often.
#[derive(Debug, Clone)]
pub struct NodeWatcherConfig {
    pub gateway: Url,
    pub nodes: Vec<String>,
    pub transport: TransportConfig,
    pub ping_interval: Duration,
    pub peers_interval: Duration,
    /// Listen to each node's event stream as well as polling.
    pub events: bool,
    /// Pause before reopening a dropped event stream.
    pub events_retry: Duration,
}

impl NodeWatcherConfig {
    pub fn new(gateway: Url) -> Self {
        Self {
            gateway,
            nodes: DEFAULT_NODES.iter().map(|n| (*n).to_owned()).collect(),
            transport: TransportConfig::default(),
            ping_interval: Duration::from_secs(20),
            peers_interval: Duration::from_secs(30),
            events: true,
            events_retry: Duration::from_secs(3),
        }
    }

    /// Same gateway and TLS settings as an operator session.
    pub fn from_session(config: &SessionConfig) -> Self {
        Self {
            transport: config.transport(),
            ..Self::new(config.gateway.clone())
        }
    }

    /// Replace the node list; an empty list keeps the defaults.
    pub fn with_nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let nodes: Vec<String> = nodes.into_iter().map(Into::into).collect();
        if !nodes.is_empty() {
            self.nodes = nodes;
        }
        self
    }
}

// ── NodeWatcher ──────────────────────────────────────────────────

struct NodeClients {
    node: String,
    poll: HttpClient,
    events: HttpClient,
}

struct Running {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

struct WatcherInner {
    nodes: Mutex<BTreeMap<String, NodeHealth>>,
    snapshot: watch::Sender<Arc<Vec<NodeHealth>>>,
}

/// Health watcher for a set of gateway nodes.
pub struct NodeWatcher {
    inner: Arc<WatcherInner>,
    clients: Vec<Arc<NodeClients>>,
    config: NodeWatcherConfig,
    running: Mutex<Option<Running>>,
}

impl NodeWatcher {
    pub fn new(config: NodeWatcherConfig) -> Result<Self, CoreError> {
        let poll = config.transport.build_client()?;
        let stream = config.transport.build_stream_client()?;
        Ok(Self::with_clients(config, &poll, &stream))
    }

    /// Build on existing `reqwest` clients (tests, shared pools).
    pub fn with_clients(
        config: NodeWatcherConfig,
        poll: &reqwest::Client,
        stream: &reqwest::Client,
    ) -> Self {
        let mut nodes = BTreeMap::new();
        let mut clients = Vec::new();
        for node in &config.nodes {
            let endpoint = Endpoint::new(config.gateway.clone(), node.as_str());
            let id = endpoint.node().to_owned();
            if nodes.contains_key(&id) {
                continue;
            }
            nodes.insert(id.clone(), NodeHealth::new(id.clone()));
            clients.push(Arc::new(NodeClients {
                node: id,
                poll: HttpClient::with_client(poll.clone(), endpoint.clone(), None),
                events: HttpClient::with_client(stream.clone(), endpoint, None),
            }));
        }

        let initial: Vec<NodeHealth> = nodes.values().cloned().collect();
        let (snapshot, _) = watch::channel(Arc::new(initial));
        Self {
            inner: Arc::new(WatcherInner {
                nodes: Mutex::new(nodes),
                snapshot,
            }),
            clients,
            config,
            running: Mutex::new(None),
        }
    }

    /// Nodes sorted by id.
    pub fn list(&self) -> Arc<Vec<NodeHealth>> {
        self.inner.snapshot.borrow().clone()
    }

    /// Receiver that sees every change to the node list.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<NodeHealth>>> {
        self.inner.snapshot.subscribe()
    }

    /// Ping and peer-health every node once, concurrently.
    pub async fn poll_once(&self) -> Arc<Vec<NodeHealth>> {
        let polls = self.clients.iter().map(|c| async move {
            tokio::join!(self.inner.ping(c), self.inner.peer_health(c));
        });
        futures_util::future::join_all(polls).await;
        self.list()
    }

    /// Start the pollers and event listeners, replacing any running set.
    ///
    /// The first ping and peer-health calls go out immediately.
    pub fn start(&self) {
        self.stop();

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();
        for clients in &self.clients {
            tasks.push(tokio::spawn(poll_loop(
                Arc::clone(&self.inner),
                Arc::clone(clients),
                self.config.ping_interval,
                self.config.peers_interval,
                cancel.child_token(),
            )));
            if self.config.events {
                tasks.push(tokio::spawn(event_loop(
                    Arc::clone(&self.inner),
                    Arc::clone(clients),
                    self.config.events_retry,
                    cancel.child_token(),
                )));
            }
        }
        info!(nodes = self.clients.len(), "node watcher started");
        *self.running() = Some(Running { cancel, tasks });
    }

    /// Stop every poller and listener. Node state is kept.
    pub fn stop(&self) {
        if let Some(running) = self.running().take() {
            running.cancel.cancel();
            for task in running.tasks {
                task.abort();
            }
            debug!("node watcher stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running().is_some()
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for NodeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl WatcherInner {
    fn update(&self, node: &str, apply: impl FnOnce(&mut NodeHealth)) {
        let list = {
            let mut nodes = self.nodes.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(health) = nodes.get_mut(node) else {
                return;
            };
            apply(health);
            nodes.values().cloned().collect::<Vec<_>>()
        };
        self.snapshot.send_replace(Arc::new(list));
    }

    async fn ping(&self, clients: &NodeClients) {
        let request = HttpRequest::public(Method::GET, PING_PATH);
        match clients.poll.call(&request).await {
            Ok(body) => self.update(&clients.node, |h| h.ping_ok(body, Utc::now())),
            Err(e) => {
                debug!(node = %clients.node, error = %e, "ping failed");
                self.update(&clients.node, |h| h.ping_failed(e.to_string()));
            }
        }
    }

    async fn peer_health(&self, clients: &NodeClients) {
        let request = HttpRequest::public(Method::GET, PEERS_PATH);
        match clients.poll.call(&request).await {
            Ok(body) => self.update(&clients.node, |h| h.peers_ok(body)),
            Err(e) => {
                debug!(node = %clients.node, error = %e, "peer health failed");
                self.update(&clients.node, |h| h.peers_failed(e.to_string()));
            }
        }
    }

    /// Follow one event stream until it ends or fails.
    async fn listen(&self, clients: &NodeClients) -> Result<(), vigil_api::Error> {
        let request = HttpRequest::public(Method::GET, EVENTS_PATH);
        let mut stream = clients.events.events(&request).await?;
        self.update(&clients.node, NodeHealth::stream_opened);

        while let Some(event) = stream.next_event().await? {
            if is_ping(&event) {
                self.update(&clients.node, |h| h.heard_ping(Utc::now()));
            }
        }
        Ok(())
    }
}

async fn poll_loop(
    inner: Arc<WatcherInner>,
    clients: Arc<NodeClients>,
    ping_every: Duration,
    peers_every: Duration,
    cancel: CancellationToken,
) {
    let mut ping = tokio::time::interval(ping_every);
    let mut peers = tokio::time::interval(peers_every);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    peers.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ping.tick() => inner.ping(&clients).await,
            _ = peers.tick() => inner.peer_health(&clients).await,
        }
    }
}

async fn event_loop(
    inner: Arc<WatcherInner>,
    clients: Arc<NodeClients>,
    retry: Duration,
    cancel: CancellationToken,
) {
    loop {
        let outcome = tokio::select! {
            () = cancel.cancelled() => return,
            outcome = inner.listen(&clients) => outcome,
        };
        match outcome {
            Ok(()) => debug!(node = %clients.node, "event stream ended"),
            Err(e) => debug!(node = %clients.node, error = %e, "event stream failed"),
        }
        inner.update(&clients.node, |h| h.sse_connected = false);

        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(retry) => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn event(name: Option<&str>, data: &str) -> SseEvent {
        SseEvent {
            event: name.map(str::to_owned),
            data: data.to_owned(),
            id: None,
        }
    }

    #[test]
    fn status_follows_ping_age() {
        let now = Utc::now();
        let mut node = NodeHealth::new("node-a");
        assert_eq!(node.status_at(now), NodeStatus::Down);

        node.heard_ping(now - TimeDelta::seconds(44));
        assert_eq!(node.status_at(now), NodeStatus::Ok);

        node.heard_ping(now - TimeDelta::seconds(45));
        assert_eq!(node.status_at(now), NodeStatus::Down);
        assert_eq!(NodeStatus::Down.to_string(), "DOWN");
    }

    #[test]
    fn ping_reply_keeps_fields_it_leaves_out() {
        let now = Utc::now();
        let mut node = NodeHealth::new("node-a");
        node.ping_ok(
            json!({"nodeId": "node-a", "regionCode": "RU-MOW", "ip": "10.0.0.1",
                   "peers": ["node-b"], "status": "OK"}),
            now,
        );
        node.ping_failed("connection refused".into());
        assert_eq!(node.public_status.as_deref(), Some("DOWN"));
        assert_eq!(node.online, Some(false));

        node.ping_ok(json!({"status": "OK"}), now);
        assert_eq!(node.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(node.region_code.as_deref(), Some("RU-MOW"));
        assert_eq!(node.peers, vec![json!("node-b")]);
        assert_eq!(node.error, None);
        assert_eq!(node.online, Some(true));
        assert_eq!(node.last_ping, Some(now));
    }

    #[test]
    fn non_object_ping_still_counts() {
        let mut node = NodeHealth::new("node-a");
        node.ping_ok(json!("pong"), Utc::now());
        assert_eq!(node.public_status, None);
        assert!(node.last_ping.is_some());
    }

    #[test]
    fn peer_health_must_be_an_array() {
        let mut node = NodeHealth::new("node-a");
        node.peers_ok(json!([{"nodeId": "node-b", "status": "UP"}]));
        assert_eq!(node.peer_health.len(), 1);

        node.peers_ok(json!({"unexpected": true}));
        assert!(node.peer_health.is_empty());

        node.peers_failed("timeout".into());
        assert_eq!(node.online, Some(false));
        assert_eq!(node.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn ping_detection_reads_payload_tags_then_event_name() {
        assert!(is_ping(&event(None, r#"{"type":"PING","ts":1}"#)));
        assert!(is_ping(&event(None, r#"{"kind":"node-ping"}"#)));
        assert!(is_ping(&event(Some("ping"), "not json")));
        assert!(!is_ping(&event(None, r#"{"type":"incident"}"#)));
        assert!(!is_ping(&event(Some("ping"), r#"{"type":"camera-alert"}"#)));
        assert!(!is_ping(&event(None, "")));
    }

    #[test]
    fn node_list_is_sorted_and_deduplicated() {
        let client = reqwest::Client::new();
        let config = NodeWatcherConfig::new("http://gw.local".parse().unwrap())
            .with_nodes(["node-c", "node-a", "/node-a/"]);
        let watcher = NodeWatcher::with_clients(config, &client, &client);
        let ids: Vec<_> = watcher.list().iter().map(|n| n.node_id.clone()).collect();
        assert_eq!(ids, vec!["node-a", "node-c"]);
        assert!(!watcher.is_running());
    }

    #[test]
    fn empty_node_list_keeps_defaults() {
        let config = NodeWatcherConfig::new("http://gw.local".parse().unwrap())
            .with_nodes(Vec::<String>::new());
        assert_eq!(config.nodes, DEFAULT_NODES);
    }
}
